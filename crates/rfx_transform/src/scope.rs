//! Scope tracking for unwrap bindings.
//!
//! Frames live in an arena and point at their parent by index. References
//! record the frame they were seen in, so once the walk is over each one can
//! be resolved to its nearest declaration, hoisted ones included.
//!
//! `Resolution::Counting` instead keeps one live counter per name while the
//! walk is in progress: a name counts as active while some open frame
//! declares it as an unwrap binding and no open frame declares it otherwise.

use rustc_hash::{FxHashMap, FxHashSet};

pub type FrameId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Program,
    Function,
    Block,
    Catch,
    Loop,
    /// Synthetic root of a standalone expression transform. Its bindings are
    /// supplied by the caller and stay alive after the walk.
    Expression,
}

impl FrameKind {
    fn is_hoist_target(self) -> bool {
        matches!(
            self,
            FrameKind::Program | FrameKind::Function | FrameKind::Expression
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Known,
    Unwrap,
}

#[derive(Debug)]
pub struct ScopeFrame {
    pub kind: FrameKind,
    pub parent: Option<FrameId>,
    known: FxHashSet<String>,
    unwrap: FxHashSet<String>,
}

impl ScopeFrame {
    pub fn lookup(&self, name: &str) -> Option<BindingKind> {
        // A frame can declare both for one name (`let a = $ref(); function a() {}`);
        // the ordinary binding wins.
        if self.known.contains(name) {
            Some(BindingKind::Known)
        } else if self.unwrap.contains(name) {
            Some(BindingKind::Unwrap)
        } else {
            None
        }
    }

    pub fn unwrap_names(&self) -> impl Iterator<Item = &str> {
        self.unwrap.iter().map(String::as_str)
    }
}

#[derive(Debug)]
pub struct ScopeTracker {
    frames: Vec<ScopeFrame>,
    stack: Vec<FrameId>,
    known_count: FxHashMap<String, usize>,
    unwrap_count: FxHashMap<String, usize>,
}

impl ScopeTracker {
    /// Tracker with a single open root frame.
    pub fn new(root: FrameKind) -> Self {
        let mut tracker = Self {
            frames: Vec::new(),
            stack: Vec::new(),
            known_count: FxHashMap::default(),
            unwrap_count: FxHashMap::default(),
        };
        tracker.enter_frame(root);
        tracker
    }

    pub fn enter_frame(&mut self, kind: FrameKind) -> FrameId {
        let id = self.frames.len();
        self.frames.push(ScopeFrame {
            kind,
            parent: self.stack.last().copied(),
            known: FxHashSet::default(),
            unwrap: FxHashSet::default(),
        });
        self.stack.push(id);
        id
    }

    /// Close the innermost frame and retire its names from the live counters.
    /// The synthetic expression root is never closed.
    pub fn leave_frame(&mut self) {
        let Some(&id) = self.stack.last() else {
            return;
        };
        let frame = &self.frames[id];
        if frame.kind == FrameKind::Expression {
            return;
        }
        for name in &frame.known {
            decrement(&mut self.known_count, name);
        }
        for name in &frame.unwrap {
            decrement(&mut self.unwrap_count, name);
        }
        self.stack.pop();
    }

    pub fn current(&self) -> FrameId {
        self.stack.last().copied().unwrap_or(0)
    }

    /// Innermost open frame that receives `var` and function hoisting.
    pub fn hoist_target(&self) -> FrameId {
        self.stack
            .iter()
            .rev()
            .copied()
            .find(|&id| self.frames[id].kind.is_hoist_target())
            .unwrap_or(0)
    }

    pub fn declare_known(&mut self, frame: FrameId, name: &str) {
        if self.frames[frame].known.insert(name.to_string()) && self.is_open(frame) {
            *self.known_count.entry(name.to_string()).or_default() += 1;
        }
    }

    pub fn declare_unwrap(&mut self, frame: FrameId, name: &str) {
        if self.frames[frame].unwrap.insert(name.to_string()) && self.is_open(frame) {
            *self.unwrap_count.entry(name.to_string()).or_default() += 1;
        }
    }

    /// Live check used by `Resolution::Counting`.
    pub fn is_active_unwrap(&self, name: &str) -> bool {
        let unwrap = self.unwrap_count.get(name).copied().unwrap_or(0);
        let known = self.known_count.get(name).copied().unwrap_or(0);
        unwrap > 0 && known == 0
    }

    /// Nearest declaration of `name` visible from `frame`.
    pub fn resolve(&self, frame: FrameId, name: &str) -> Option<BindingKind> {
        let mut cursor = Some(frame);
        while let Some(id) = cursor {
            let scope = self.frames.get(id)?;
            if let Some(kind) = scope.lookup(name) {
                return Some(kind);
            }
            cursor = scope.parent;
        }
        None
    }

    pub fn frame(&self, id: FrameId) -> Option<&ScopeFrame> {
        self.frames.get(id)
    }

    fn is_open(&self, frame: FrameId) -> bool {
        self.stack.contains(&frame)
    }
}

fn decrement(counts: &mut FxHashMap<String, usize>, name: &str) {
    if let Some(count) = counts.get_mut(name) {
        *count = count.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_known_shadows_outer_unwrap() {
        let mut scopes = ScopeTracker::new(FrameKind::Program);
        scopes.declare_unwrap(0, "count");
        let inner = scopes.enter_frame(FrameKind::Function);
        scopes.declare_known(inner, "count");
        let block = scopes.enter_frame(FrameKind::Block);

        assert_eq!(scopes.resolve(block, "count"), Some(BindingKind::Known));
        assert_eq!(scopes.resolve(0, "count"), Some(BindingKind::Unwrap));
        assert_eq!(scopes.resolve(block, "other"), None);
    }

    #[test]
    fn known_wins_within_one_frame() {
        let mut scopes = ScopeTracker::new(FrameKind::Program);
        scopes.declare_unwrap(0, "a");
        scopes.declare_known(0, "a");
        assert_eq!(scopes.resolve(0, "a"), Some(BindingKind::Known));
    }

    #[test]
    fn counters_follow_open_frames() {
        let mut scopes = ScopeTracker::new(FrameKind::Program);
        scopes.declare_unwrap(0, "a");
        assert!(scopes.is_active_unwrap("a"));

        let f = scopes.enter_frame(FrameKind::Function);
        scopes.declare_known(f, "a");
        assert!(!scopes.is_active_unwrap("a"));

        scopes.leave_frame();
        assert!(scopes.is_active_unwrap("a"));
    }

    #[test]
    fn any_open_known_binding_deactivates() {
        let mut scopes = ScopeTracker::new(FrameKind::Program);
        scopes.declare_unwrap(0, "a");
        let block = scopes.enter_frame(FrameKind::Block);
        scopes.declare_unwrap(block, "a");
        let f = scopes.enter_frame(FrameKind::Function);
        scopes.declare_known(f, "a");
        assert!(!scopes.is_active_unwrap("a"));

        scopes.leave_frame();
        assert!(scopes.is_active_unwrap("a"));
    }

    #[test]
    fn expression_root_survives_leave() {
        let mut scopes = ScopeTracker::new(FrameKind::Expression);
        scopes.declare_unwrap(0, "a");
        scopes.leave_frame();
        assert!(scopes.is_active_unwrap("a"));
        assert_eq!(scopes.current(), 0);
    }

    #[test]
    fn var_hoists_past_blocks() {
        let mut scopes = ScopeTracker::new(FrameKind::Program);
        let f = scopes.enter_frame(FrameKind::Function);
        scopes.enter_frame(FrameKind::Block);
        scopes.enter_frame(FrameKind::Loop);
        assert_eq!(scopes.hoist_target(), f);
    }
}
