// Selection Resolver
// Feature: Compose/Stream/Reconcile pipeline (001-workbench-core)
//
// Derives the exact text submitted to the model from the editor's selection state.
// Offsets are character offsets, not byte offsets.

/// Lines of context included around a selection when the caller has no preference
pub const DEFAULT_CONTEXT_RADIUS: usize = 3;

/// Resolve the user input for a compose call.
///
/// Falls back to `full_text` when selection-only mode is off, the selection is
/// empty, either offset is missing, or the range is zero-width. Otherwise returns
/// a `[Lines s-e]` header followed by the selected lines plus `context_radius`
/// lines on each side. The header reports the selection's lines, not the context's.
pub fn resolve_input(
    send_selection_only: bool,
    selection_text: &str,
    full_text: &str,
    selection_start: Option<usize>,
    selection_end: Option<usize>,
    context_radius: usize,
) -> String {
    let (start, end) = match (selection_start, selection_end) {
        (Some(start), Some(end))
            if send_selection_only && !selection_text.is_empty() && start != end =>
        {
            (start, end)
        }
        _ => return full_text.to_string(),
    };

    if full_text.is_empty() {
        return String::new();
    }

    let length = full_text.chars().count();
    let start = start.min(length);
    let end = end.min(length).max(start);

    let lines: Vec<&str> = full_text.split('\n').collect();
    let start_line = line_index_before(full_text, start);
    let end_line = line_index_before(full_text, end);

    let from = start_line.saturating_sub(context_radius);
    let to = end_line
        .saturating_add(context_radius)
        .saturating_add(1)
        .min(lines.len());
    let context = lines[from..to].join("\n");

    format!("[Lines {}-{}]\n{}", start_line + 1, end_line + 1, context)
}

/// 0-based index of the line containing the character at `end_exclusive`
fn line_index_before(text: &str, end_exclusive: usize) -> usize {
    if text.is_empty() || end_exclusive == 0 {
        return 0;
    }
    text.chars().take(end_exclusive).filter(|c| *c == '\n').count()
}

/// One-line badge describing what will be sent: mode, line count and character count.
///
/// A single trailing empty line is not counted.
pub fn format_selection_summary(send_selection_only: bool, selection: &str, preview: &str) -> String {
    let label = if send_selection_only && !selection.is_empty() {
        format!("selection + {} lines context", DEFAULT_CONTEXT_RADIUS)
    } else {
        "full text".to_string()
    };

    let lines = if preview.is_empty() {
        0
    } else {
        let total = preview.split('\n').count();
        if preview.ends_with('\n') {
            total - 1
        } else {
            total
        }
    };

    format!(
        "{} / lines sent: {} / chars sent: ~{}",
        label,
        lines,
        preview.chars().count()
    )
}
