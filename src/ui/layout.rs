// ABOUTME: Pure layout math for the dashboard panels
// Column widths are a function of terminal width so they stay unit-testable

/// Terminals narrower than this drop to the compact column set.
pub const NARROW_THRESHOLD: u16 = 100;

/// Fixed overhead per agent row: status icon, separators, elapsed column.
const ROW_OVERHEAD: u16 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnWidths {
    pub name: u16,
    pub model: u16,
    pub task: u16,
    pub narrow: bool,
}

impl ColumnWidths {
    pub fn for_width(width: u16) -> Self {
        let narrow = width < NARROW_THRESHOLD;
        let (name, model) = if narrow { (12, 4) } else { (16, 8) };
        let task = width
            .saturating_sub(name + model + ROW_OVERHEAD)
            .max(10);
        Self {
            name,
            model,
            task,
            narrow,
        }
    }
}

/// Proportional block bar, filled left to right.
pub fn make_bar(value: u64, max: u64, width: usize) -> String {
    let filled = if max > 0 {
        ((value as f64 / max as f64) * width as f64).round() as usize
    } else {
        0
    };
    let filled = filled.min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Wave completion bar: filled blocks proportional to completed agents.
pub fn completion_bar(done: usize, total: usize, width: usize) -> String {
    make_bar(done as u64, total as u64, width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_terminal_columns() {
        let cols = ColumnWidths::for_width(120);
        assert!(!cols.narrow);
        assert_eq!(cols.name, 16);
        assert_eq!(cols.model, 8);
        assert_eq!(cols.task, 120 - 16 - 8 - 14);
    }

    #[test]
    fn test_narrow_terminal_columns() {
        let cols = ColumnWidths::for_width(80);
        assert!(cols.narrow);
        assert_eq!(cols.name, 12);
        assert_eq!(cols.model, 4);
    }

    #[test]
    fn test_task_column_has_a_floor() {
        let cols = ColumnWidths::for_width(20);
        assert_eq!(cols.task, 10);
    }

    #[test]
    fn test_threshold_boundary() {
        assert!(ColumnWidths::for_width(99).narrow);
        assert!(!ColumnWidths::for_width(100).narrow);
    }

    #[test]
    fn test_make_bar_proportions() {
        assert_eq!(make_bar(0, 10, 4), "░░░░");
        assert_eq!(make_bar(5, 10, 4), "██░░");
        assert_eq!(make_bar(10, 10, 4), "████");
        // Zero max never divides.
        assert_eq!(make_bar(3, 0, 4), "░░░░");
    }

    #[test]
    fn test_completion_bar_full_at_all_done() {
        assert_eq!(completion_bar(3, 3, 6), "██████");
        assert_eq!(completion_bar(1, 3, 6), "██░░░░");
    }
}
