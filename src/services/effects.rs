//! Notification and sound feedback on timer transitions
//!
//! Hooks are fire-and-forget: they spawn the platform helper and never
//! report back to the timer.

use tokio::{process::Command, runtime::Handle};
use tracing::debug;

use crate::{config::Settings, state::ProjectRef, utils::format_duration};

/// Feedback fired after each successful transition
pub trait EffectHooks: Send + Sync {
    fn on_start(&self, project: &ProjectRef);
    fn on_pause(&self);
    fn on_resume(&self);
    fn on_stop(&self, project_name: &str, elapsed_seconds: u64);
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEffects;

impl EffectHooks for NoEffects {
    fn on_start(&self, _project: &ProjectRef) {}
    fn on_pause(&self) {}
    fn on_resume(&self) {}
    fn on_stop(&self, _project_name: &str, _elapsed_seconds: u64) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SoundCue {
    Start,
    Pause,
    Resume,
    Stop,
}

impl SoundCue {
    /// freedesktop sound theme id
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    fn theme_id(self) -> &'static str {
        match self {
            SoundCue::Start => "service-login",
            SoundCue::Pause => "dialog-information",
            SoundCue::Resume => "message-new-instant",
            SoundCue::Stop => "complete",
        }
    }

    #[cfg_attr(not(target_os = "macos"), allow(dead_code))]
    fn system_sound(self) -> &'static str {
        match self {
            SoundCue::Start => "/System/Library/Sounds/Glass.aiff",
            SoundCue::Pause => "/System/Library/Sounds/Pop.aiff",
            SoundCue::Resume => "/System/Library/Sounds/Tink.aiff",
            SoundCue::Stop => "/System/Library/Sounds/Hero.aiff",
        }
    }
}

/// Desktop notifications and sounds through the platform helpers
#[derive(Debug, Clone)]
pub struct DesktopEffects {
    notifications: bool,
    sound: bool,
}

impl DesktopEffects {
    pub fn new(settings: &Settings) -> Self {
        Self {
            notifications: settings.enable_notifications,
            sound: settings.enable_sound_feedback,
        }
    }

    fn play(&self, cue: SoundCue) {
        if !self.sound {
            return;
        }
        debug!("Playing {:?} sound", cue);
        #[cfg(target_os = "linux")]
        spawn_helper("canberra-gtk-play", vec!["-i".into(), cue.theme_id().into()]);
        #[cfg(target_os = "macos")]
        spawn_helper("afplay", vec![cue.system_sound().into()]);
    }

    fn notify(&self, title: &str, body: &str) {
        if !self.notifications {
            return;
        }
        debug!("Notifying: {} - {}", title, body);
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            let (program, args) = notification_command(title, body);
            spawn_helper(program, args);
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        let _ = (title, body);
    }
}

/// Helper and arguments for a desktop notification.
///
/// Title and body are passed as separate arguments after `--`, never spliced
/// into script source or parsed as options.
#[cfg(target_os = "linux")]
fn notification_command(title: &str, body: &str) -> (&'static str, Vec<String>) {
    ("notify-send", vec!["--".into(), title.into(), body.into()])
}

#[cfg(target_os = "macos")]
fn notification_command(title: &str, body: &str) -> (&'static str, Vec<String>) {
    let script = [
        "on run argv",
        "display notification (item 2 of argv) with title (item 1 of argv)",
        "end run",
    ];
    let mut args = Vec::new();
    for line in script {
        args.push("-e".to_string());
        args.push(line.to_string());
    }
    args.extend(["--".to_string(), title.to_string(), body.to_string()]);
    ("osascript", args)
}

impl EffectHooks for DesktopEffects {
    fn on_start(&self, project: &ProjectRef) {
        self.play(SoundCue::Start);
        self.notify("Timer started", &format!("Tracking time for {}", project.name));
    }

    fn on_pause(&self) {
        self.play(SoundCue::Pause);
    }

    fn on_resume(&self) {
        self.play(SoundCue::Resume);
    }

    fn on_stop(&self, project_name: &str, elapsed_seconds: u64) {
        self.play(SoundCue::Stop);
        self.notify(
            "Timer stopped",
            &format!("{}: {}", project_name, format_duration(elapsed_seconds)),
        );
    }
}

/// Run a helper without waiting for it. Outside a runtime this is skipped.
#[cfg_attr(not(any(target_os = "linux", target_os = "macos")), allow(dead_code))]
fn spawn_helper(program: &'static str, args: Vec<String>) {
    let Ok(handle) = Handle::try_current() else {
        debug!("No runtime available, skipping {}", program);
        return;
    };

    handle.spawn(async move {
        match Command::new(program).args(&args).output().await {
            Ok(output) if !output.status.success() => {
                debug!(
                    "{} exited with {}: {}",
                    program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr)
                );
            }
            Ok(_) => {}
            Err(e) => debug!("Failed to run {}: {}", program, e),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_effects_do_not_need_a_runtime() {
        let settings = Settings {
            enable_notifications: false,
            enable_sound_feedback: false,
            ..Settings::default()
        };
        let effects = DesktopEffects::new(&settings);
        effects.on_start(&ProjectRef::new("p", "Project", "#fff"));
        effects.on_stop("Project", 61);
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    #[test]
    fn notification_text_stays_out_of_the_command() {
        let name = r#"x\" & (do shell script "touch /tmp/pwned") --"#;
        let body = format!("{}: 00:01:01", name);
        let (_, args) = notification_command("Timer stopped", &body);

        let (text, leading) = args.split_last().unwrap();
        assert_eq!(text, &body);
        assert_eq!(leading.last().map(String::as_str), Some("Timer stopped"));
        assert!(leading.iter().any(|arg| arg == "--"));
        assert!(leading.iter().all(|arg| !arg.contains(name)));
    }

    #[test]
    fn enabled_effects_outside_runtime_are_skipped() {
        let effects = DesktopEffects::new(&Settings::default());
        effects.on_pause();
        effects.on_resume();
    }
}
