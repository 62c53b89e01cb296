use editlayer_core::{Config, RenameTracker};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, FileIdMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Feeds renames seen on disk into the [`RenameTracker`].
pub struct RenameWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher, FileIdMap>,
}

impl RenameWatcher {
    pub fn new(
        root_path: &Path,
        config: &Config,
        tracker: Arc<Mutex<RenameTracker>>,
    ) -> anyhow::Result<Self> {
        let root_path = root_path.to_path_buf();
        let ignore_patterns = config.ignore_patterns.clone();

        let (tx, mut rx) = mpsc::channel(100);

        let mut debouncer = new_debouncer(
            config.debounce(),
            None,
            move |result: DebounceEventResult| {
                if let Err(e) = tx.blocking_send(result) {
                    error!("Failed to send event: {}", e);
                }
            },
        )?;

        debouncer
            .watcher()
            .watch(&root_path, RecursiveMode::Recursive)?;
        debouncer
            .cache()
            .add_root(&root_path, RecursiveMode::Recursive);

        info!("Rename watcher started for {:?}", root_path);

        tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                match result {
                    Ok(events) => {
                        for event in events {
                            if let Err(e) = Self::handle_event(
                                event.event,
                                &root_path,
                                &ignore_patterns,
                                &tracker,
                            ) {
                                error!("Error handling event: {}", e);
                            }
                        }
                    }
                    Err(errors) => {
                        for error in errors {
                            error!("Watch error: {:?}", error);
                        }
                    }
                }
            }
        });

        Ok(Self {
            _debouncer: debouncer,
        })
    }

    fn handle_event(
        event: Event,
        root_path: &Path,
        ignore_patterns: &[String],
        tracker: &Mutex<RenameTracker>,
    ) -> anyhow::Result<()> {
        let Some((old_path, new_path)) = Self::rename_paths(&event, root_path, ignore_patterns)
        else {
            return Ok(());
        };

        debug!(from = %old_path, to = %new_path, "rename observed");
        tracker
            .lock()
            .map_err(|_| anyhow::anyhow!("rename tracker lock poisoned"))?
            .log_rename(&old_path, &new_path);

        Ok(())
    }

    /// Store-relative `(old, new)` for a completed rename inside the root.
    fn rename_paths(
        event: &Event,
        root_path: &Path,
        ignore_patterns: &[String],
    ) -> Option<(String, String)> {
        if !matches!(event.kind, EventKind::Modify(ModifyKind::Name(RenameMode::Both))) {
            return None;
        }
        let [from, to] = event.paths.as_slice() else {
            return None;
        };
        if Self::should_ignore(from, root_path, ignore_patterns)
            || Self::should_ignore(to, root_path, ignore_patterns)
        {
            return None;
        }

        Some((
            Self::relative(from, root_path)?,
            Self::relative(to, root_path)?,
        ))
    }

    fn relative(path: &Path, root_path: &Path) -> Option<String> {
        let relative = path
            .strip_prefix(root_path)
            .ok()?
            .to_string_lossy()
            .replace('\\', "/");
        (!relative.is_empty()).then_some(relative)
    }

    fn should_ignore(path: &Path, root_path: &Path, ignore_patterns: &[String]) -> bool {
        let relative_path = path.strip_prefix(root_path).unwrap_or(path);

        relative_path.components().any(|component| {
            let component = component.as_os_str().to_string_lossy();
            ignore_patterns.iter().any(|pattern| component == pattern.as_str())
        })
    }
}
