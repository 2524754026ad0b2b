// Diff Reconciliation Flow
// Feature: Compose/Stream/Reconcile pipeline (001-workbench-core)
//
// Generated text never overwrites the left pane without review:
// open shows a unified diff, confirm applies, cancel discards.

use similar::TextDiff;

/// Placeholder file name for the left pane
pub const LEFT_LABEL: &str = "left";
/// Placeholder file name for the right pane
pub const RIGHT_LABEL: &str = "right";
/// Lines of context around each hunk
pub const DIFF_CONTEXT_LINES: usize = 3;

const BANNER: &str = "===================================================================";

/// Unified diff of `before` against `after`.
///
/// Identical inputs produce a fixed "no differences" marker instead of an empty diff.
pub fn build_unified_diff(before: &str, after: &str) -> String {
    if before == after {
        return [
            format!("--- {}", LEFT_LABEL),
            format!("+++ {}", RIGHT_LABEL),
            "@@".to_string(),
            "  (no differences)".to_string(),
        ]
        .join("\n");
    }

    let diff = TextDiff::from_lines(before, after);
    let patch = diff
        .unified_diff()
        .context_radius(DIFF_CONTEXT_LINES)
        .header(LEFT_LABEL, RIGHT_LABEL)
        .to_string();
    tidy_patch(&patch)
}

/// Drop a leading `====` banner and trailing blank lines
fn tidy_patch(patch: &str) -> String {
    let mut lines: Vec<&str> = patch.split('\n').collect();
    if lines.first() == Some(&BANNER) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Editor-side accessors the preview flow drives
pub trait DiffPreviewHost {
    fn read_left(&self) -> String;
    fn read_right(&self) -> String;
    /// Display the patch
    fn show(&mut self, patch: &str);
    /// Replace the left pane content
    fn apply(&mut self, text: String);
    /// Dismiss the preview
    fn close(&mut self);
}

/// Approve-or-discard flow over a host
#[derive(Debug)]
pub struct DiffPreviewFlow<H> {
    host: H,
    open: bool,
}

impl<H: DiffPreviewHost> DiffPreviewFlow<H> {
    pub fn new(host: H) -> Self {
        Self { host, open: false }
    }

    /// Diff the current left and right contents and show it. Returns the patch.
    pub fn open(&mut self) -> String {
        let patch = build_unified_diff(&self.host.read_left(), &self.host.read_right());
        self.host.show(&patch);
        self.open = true;
        patch
    }

    /// Apply the right pane as it is now, not as it was when the diff was shown
    pub fn confirm(&mut self) {
        let right = self.host.read_right();
        self.host.apply(right);
        self.close();
    }

    pub fn cancel(&mut self) {
        self.close();
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    fn close(&mut self) {
        self.host.close();
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Panes {
        left: String,
        right: Rc<RefCell<String>>,
        patches: Vec<String>,
        visible: bool,
        closes: usize,
    }

    impl DiffPreviewHost for Panes {
        fn read_left(&self) -> String {
            self.left.clone()
        }
        fn read_right(&self) -> String {
            self.right.borrow().clone()
        }
        fn show(&mut self, patch: &str) {
            self.visible = true;
            self.patches.push(patch.to_string());
        }
        fn apply(&mut self, text: String) {
            self.left = text;
        }
        fn close(&mut self) {
            self.visible = false;
            self.closes += 1;
        }
    }

    fn flow(left: &str, right: &str) -> DiffPreviewFlow<Panes> {
        DiffPreviewFlow::new(Panes {
            left: left.to_string(),
            right: Rc::new(RefCell::new(right.to_string())),
            ..Default::default()
        })
    }

    #[test]
    fn test_diff_marks_changed_lines() {
        let patch = build_unified_diff("line1\nleft", "line1\nright");
        let lines: Vec<&str> = patch.lines().collect();
        assert_eq!(lines[0], "--- left");
        assert_eq!(lines[1], "+++ right");
        assert!(lines.contains(&"-left"));
        assert!(lines.contains(&"+right"));
        assert!(lines.contains(&" line1"));
        assert!(!patch.ends_with('\n'));
    }

    #[test]
    fn test_identical_inputs_produce_marker() {
        assert_eq!(
            build_unified_diff("same\n", "same\n"),
            "--- left\n+++ right\n@@\n  (no differences)"
        );
        assert_eq!(
            build_unified_diff("", ""),
            "--- left\n+++ right\n@@\n  (no differences)"
        );
    }

    #[test]
    fn test_context_window_is_three_lines() {
        let before: String = (1..=20).map(|n| format!("{}\n", n)).collect();
        let after = before.replace("10\n", "ten\n");
        let patch = build_unified_diff(&before, &after);

        assert!(patch.contains("@@ -7,7 +7,7 @@"));
        assert!(patch.contains("\n 7\n"));
        assert!(!patch.contains("\n 6\n"));
        assert!(!patch.contains("\n 14\n"));
    }

    #[test]
    fn test_tidy_patch_strips_banner_and_trailing_blank_lines() {
        let raw = format!("{}\n--- left\n+++ right\n@@ -1 +1 @@\n-a\n+b\n\n\n", BANNER);
        assert_eq!(tidy_patch(&raw), "--- left\n+++ right\n@@ -1 +1 @@\n-a\n+b");
    }

    #[test]
    fn test_open_does_not_mutate_and_is_repeatable() {
        let mut flow = flow("line1\nleft", "line1\nright");
        let first = flow.open();
        let second = flow.open();

        assert_eq!(first, second);
        assert!(flow.is_open());
        assert!(flow.host().visible);
        assert_eq!(flow.host().left, "line1\nleft");
        assert_eq!(flow.host().patches.len(), 2);
    }

    #[test]
    fn test_cancel_never_mutates() {
        let mut flow = flow("line1\nleft", "line1\nright");
        flow.open();
        flow.cancel();

        assert!(!flow.is_open());
        assert!(!flow.host().visible);
        assert_eq!(flow.host().left, "line1\nleft");
    }

    #[test]
    fn test_confirm_applies_and_closes() {
        let mut flow = flow("line1\nleft", "line1\nright");
        flow.open();
        flow.cancel();
        flow.open();
        flow.confirm();

        let panes = flow.host();
        assert_eq!(panes.left, "line1\nright");
        assert!(!panes.visible);
        assert_eq!(panes.patches.len(), 2);
        assert_eq!(panes.closes, 2);
    }

    #[test]
    fn test_confirm_uses_live_right_pane() {
        let mut flow = flow("a", "b");
        let right = flow.host().right.clone();
        let patch = flow.open();
        assert!(patch.contains("+b"));

        *right.borrow_mut() = "c".to_string();
        flow.confirm();
        assert_eq!(flow.host().left, "c");
    }
}
