use std::fmt;

pub type DirtyHook = Box<dyn FnMut(bool) + Send>;

/// Records whether the working set has drifted from what the assistant was
/// last told. The hook fires on transitions only.
#[derive(Default)]
pub struct DirtyTracker {
    dirty: bool,
    hook: Option<DirtyHook>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(hook: DirtyHook) -> Self {
        Self {
            dirty: false,
            hook: Some(hook),
        }
    }

    pub fn set_hook(&mut self, hook: DirtyHook) {
        self.hook = Some(hook);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns true when the flag actually changed.
    pub fn set(&mut self, dirty: bool) -> bool {
        if self.dirty == dirty {
            return false;
        }
        self.dirty = dirty;
        if let Some(hook) = self.hook.as_mut() {
            hook(dirty);
        }
        true
    }

    pub fn mark(&mut self) -> bool {
        self.set(true)
    }

    pub fn clear(&mut self) -> bool {
        self.set(false)
    }
}

impl fmt::Debug for DirtyTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirtyTracker")
            .field("dirty", &self.dirty)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
