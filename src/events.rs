//! Lifecycle notifications delivered to the caller.
//!
//! Every callback runs on the blocking pool, detached from the component that
//! emitted it, so a slow or blocking callback never stalls a worker or the
//! controller. The controller emits each lifecycle event at most once per
//! transition; `on_error` fires once per abandoned block.

use std::sync::Arc;

use crate::error::DownloadError;

type Callback = Arc<dyn Fn() + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(DownloadError) + Send + Sync>;

#[derive(Clone, Default)]
pub struct EventSink {
    on_start: Option<Callback>,
    on_finish: Option<Callback>,
    on_pause: Option<Callback>,
    on_resume: Option<Callback>,
    on_error: Option<ErrorCallback>,
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("on_start", &self.on_start.is_some())
            .field("on_finish", &self.on_finish.is_some())
            .field("on_pause", &self.on_pause.is_some())
            .field("on_resume", &self.on_resume.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl EventSink {
    pub fn set_on_start(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.on_start = Some(Arc::new(f));
    }

    pub fn set_on_finish(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.on_finish = Some(Arc::new(f));
    }

    pub fn set_on_pause(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.on_pause = Some(Arc::new(f));
    }

    pub fn set_on_resume(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.on_resume = Some(Arc::new(f));
    }

    pub fn set_on_error(&mut self, f: impl Fn(DownloadError) + Send + Sync + 'static) {
        self.on_error = Some(Arc::new(f));
    }

    pub fn start(&self) {
        Self::emit(&self.on_start);
    }

    pub fn finish(&self) {
        Self::emit(&self.on_finish);
    }

    pub fn pause(&self) {
        Self::emit(&self.on_pause);
    }

    pub fn resume(&self) {
        Self::emit(&self.on_resume);
    }

    pub fn error(&self, err: DownloadError) {
        if let Some(f) = self.on_error.clone() {
            tokio::task::spawn_blocking(move || f(err));
        }
    }

    fn emit(slot: &Option<Callback>) {
        if let Some(f) = slot.clone() {
            tokio::task::spawn_blocking(move || f());
        }
    }
}
