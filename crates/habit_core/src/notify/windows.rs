use crate::error::AppError;
use crate::model::Task;
use crate::notify::{
    NOTIFICATION_TITLE, Notifier, launch_show, parse_activation_argument, reminder_text,
    wait_until,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tauri_winrt_notification::Toast;

/// Toast notifications. Counts toasts with an action that were neither
/// activated nor dismissed yet.
#[derive(Default)]
pub struct WindowsNotifier {
    open: Arc<AtomicUsize>,
}

fn open_task(task_id: &str) {
    if let Err(err) = launch_show(task_id) {
        tracing::warn!(task_id, error = %err, "cannot open task");
    }
}

impl Notifier for WindowsNotifier {
    fn notify(&self, task: &Task) -> Result<(), AppError> {
        self.notify_with_action(task, "")
    }

    fn notify_with_action(&self, task: &Task, action: &str) -> Result<(), AppError> {
        let task_id = task.id.clone();
        let action_value = action.to_string();
        let mut toast = Toast::new(Toast::POWERSHELL_APP_ID)
            .title(NOTIFICATION_TITLE)
            .text1(&reminder_text(task))
            .text2(&task.id);

        if action_value.trim().is_empty() {
            return toast.show().map_err(|err| AppError::io(err.to_string()));
        }
        toast = toast.add_button("Open", &action_value);

        // Activation and dismissal each release the toast, whichever comes first.
        let resolved = Arc::new(AtomicBool::new(false));
        let release = {
            let open = Arc::clone(&self.open);
            move |resolved: &AtomicBool| {
                if !resolved.swap(true, Ordering::SeqCst) {
                    open.fetch_sub(1, Ordering::SeqCst);
                }
            }
        };
        let release_on_dismiss = release.clone();
        let dismissed = Arc::clone(&resolved);

        self.open.fetch_add(1, Ordering::SeqCst);
        let shown = toast
            .on_activated(move |args| {
                match args {
                    Some(args) if args == action_value => open_task(&task_id),
                    Some(args) => match parse_activation_argument(&args) {
                        Some(id) => open_task(&id),
                        None if args.trim().is_empty() => open_task(&task_id),
                        None => {}
                    },
                    None => open_task(&task_id),
                }
                release(&*resolved);
                Ok(())
            })
            .on_dismissed(move |_reason| {
                release_on_dismiss(&*dismissed);
                Ok(())
            })
            .show();

        if let Err(err) = shown {
            self.open.fetch_sub(1, Ordering::SeqCst);
            return Err(AppError::io(err.to_string()));
        }
        Ok(())
    }

    fn wait_for_actions(&self, timeout: Duration) -> bool {
        wait_until(timeout, || self.open.load(Ordering::SeqCst) == 0)
    }
}
