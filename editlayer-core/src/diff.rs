use crate::models::{CompositeChange, CompositeKind};
use similar::{ChangeTag, TextDiff};

/// Line-level rendering of a staged composite, for display.
#[derive(Debug, Clone)]
pub struct FileDiff {
    pub path: String,
    pub old_path: String,
    pub kind: CompositeKind,
    pub old_content: Option<String>,
    pub new_content: Option<String>,
    pub diff_lines: Vec<DiffLine>,
}

#[derive(Debug, Clone)]
pub struct DiffLine {
    pub line_type: DiffLineType,
    pub content: String,
    pub old_line_number: Option<usize>,
    pub new_line_number: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLineType {
    Context,
    Addition,
    Deletion,
}

impl FileDiff {
    pub fn from_composite(composite: &CompositeChange) -> Self {
        let old_content = composite.before.clone();
        let new_content = composite.after.clone();

        let diff_lines = match composite.kind {
            CompositeKind::Rename => Vec::new(),
            _ => Self::compute_diff(
                old_content.as_deref().unwrap_or_default(),
                new_content.as_deref().unwrap_or_default(),
            ),
        };

        FileDiff {
            path: composite.path.clone(),
            old_path: composite.source_path().to_string(),
            kind: composite.kind,
            old_content,
            new_content,
            diff_lines,
        }
    }

    fn compute_diff(old_text: &str, new_text: &str) -> Vec<DiffLine> {
        let diff = TextDiff::from_lines(old_text, new_text);
        let mut lines = Vec::new();
        let mut old_line_num = 1;
        let mut new_line_num = 1;

        for change in diff.iter_all_changes() {
            let (line_type, old_num, new_num) = match change.tag() {
                ChangeTag::Delete => {
                    let num = old_line_num;
                    old_line_num += 1;
                    (DiffLineType::Deletion, Some(num), None)
                }
                ChangeTag::Insert => {
                    let num = new_line_num;
                    new_line_num += 1;
                    (DiffLineType::Addition, None, Some(num))
                }
                ChangeTag::Equal => {
                    let old_num = old_line_num;
                    let new_num = new_line_num;
                    old_line_num += 1;
                    new_line_num += 1;
                    (DiffLineType::Context, Some(old_num), Some(new_num))
                }
            };

            lines.push(DiffLine {
                line_type,
                content: change.to_string(),
                old_line_number: old_num,
                new_line_number: new_num,
            });
        }

        lines
    }

    pub fn has_changes(&self) -> bool {
        self.diff_lines
            .iter()
            .any(|l| l.line_type != DiffLineType::Context)
    }

    pub fn format_unified(&self, context_lines: usize) -> String {
        let old_text = self.old_content.as_deref().unwrap_or_default();
        let new_text = self.new_content.as_deref().unwrap_or_default();
        let old_header = match self.kind {
            CompositeKind::Create => "/dev/null".to_string(),
            _ => format!("a/{}", self.old_path),
        };
        let new_header = match self.kind {
            CompositeKind::Delete => "/dev/null".to_string(),
            _ => format!("b/{}", self.path),
        };

        TextDiff::from_lines(old_text, new_text)
            .unified_diff()
            .context_radius(context_lines)
            .header(&old_header, &new_header)
            .to_string()
    }
}
