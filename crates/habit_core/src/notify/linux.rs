use crate::error::AppError;
use crate::model::Task;
use crate::notify::{NOTIFICATION_TITLE, Notifier, launch_show, reminder_text, wait_until};
use notify_rust::Notification;
use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Desktop notifications over D-Bus. Each action is awaited on its own
/// thread until the notification is clicked or closed.
#[derive(Default)]
pub struct LinuxNotifier {
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl Notifier for LinuxNotifier {
    fn notify(&self, task: &Task) -> Result<(), AppError> {
        self.notify_with_action(task, "")
    }

    fn notify_with_action(&self, task: &Task, action: &str) -> Result<(), AppError> {
        let mut notification = Notification::new();
        notification.summary(NOTIFICATION_TITLE);
        notification.body(&reminder_text(task));
        if !action.trim().is_empty() {
            notification.action(action, "Open");
        }

        let handle = notification
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;

        if !action.trim().is_empty() {
            let action_key = action.to_string();
            let task_id = task.id.clone();
            let waiter = std::thread::spawn(move || {
                handle.wait_for_action(|selected| {
                    if (selected == action_key || selected == "default")
                        && let Err(err) = launch_show(&task_id)
                    {
                        tracing::warn!(task_id = %task_id, error = %err, "cannot open task");
                    }
                });
            });
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(waiter);
        }

        Ok(())
    }

    fn wait_for_actions(&self, timeout: Duration) -> bool {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let resolved = wait_until(timeout, || pending.iter().all(JoinHandle::is_finished));
        if !resolved {
            let open = pending.iter().filter(|waiter| !waiter.is_finished()).count();
            tracing::debug!(open, "stopped waiting for notification actions");
        }
        resolved
    }
}
