use serde::Serialize;

use crate::error::{Error, Result};

/// Maximum stored length of a window name, in bytes
pub const NAME_CAPACITY: usize = 128;

/// Maximum stored length of a working directory, in bytes
pub const PATH_CAPACITY: usize = 4096;

/// tmux format string producing one `index<TAB>name<TAB>path` line per window.
///
/// `pane_current_path` follows the shell's cwd; `pane_path` is only set when
/// the shell reports it over OSC 7.
pub const WINDOW_FORMAT: &str = "#{window_index}\t#{window_name}\t#{pane_current_path}";

const FIELD_COUNT: usize = 3;

/// One window of a tmux session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Window {
    pub index: i32,
    pub name: String,
    pub working_dir: String,
}

impl Window {
    pub fn new(index: i32, name: impl Into<String>, working_dir: impl Into<String>) -> Self {
        Self {
            index,
            name: truncate_to(name.into(), NAME_CAPACITY),
            working_dir: truncate_to(working_dir.into(), PATH_CAPACITY),
        }
    }
}

/// Decode one `list-windows` report line.
///
/// Missing trailing fields are left at their defaults. The index is read
/// like C `atoi`, so garbage there becomes `0` rather than an error.
pub fn parse_window_line(line: &str) -> Result<Window> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() > FIELD_COUNT {
        return Err(Error::MalformedReport {
            line: line.to_string(),
            fields: fields.len(),
        });
    }

    let mut window = Window::default();
    let mut it = fields.into_iter();
    if let Some(index) = it.next() {
        window.index = parse_index(index);
    }
    if let Some(name) = it.next() {
        window.name = truncate_to(name.to_string(), NAME_CAPACITY);
    }
    if let Some(path) = it.next() {
        window.working_dir = truncate_to(path.to_string(), PATH_CAPACITY);
    }
    Ok(window)
}

/// Leading-digits integer parse; anything unparseable is 0.
fn parse_index(s: &str) -> i32 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            (acc * 10 + i64::from(d - b'0')).min(i64::from(i32::MAX) + 1)
        });
    let value = if negative { -value } else { value };
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn truncate_to(mut s: String, capacity: usize) -> String {
    if s.len() > capacity {
        let mut end = capacity;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
    s
}

/// Direction a [`WindowList`] is walked in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    /// Most recently parsed window first
    NewestFirst,
    /// The order tmux reported, ascending index
    Report,
}

/// Windows of one session, stored in report order.
///
/// A freshly built list walks newest-first; [`WindowList::invert`] flips the
/// walk without moving any record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowList {
    windows: Vec<Window>,
    order: Order,
}

impl WindowList {
    fn new() -> Self {
        Self {
            windows: Vec::new(),
            order: Order::NewestFirst,
        }
    }

    fn push(&mut self, window: Window) {
        self.windows.push(window);
    }

    /// Reverse the traversal direction
    pub fn invert(mut self) -> Self {
        self.order = match self.order {
            Order::NewestFirst => Order::Report,
            Order::Report => Order::NewestFirst,
        };
        self
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &Window> + '_> {
        match self.order {
            Order::Report => Box::new(self.windows.iter()),
            Order::NewestFirst => Box::new(self.windows.iter().rev()),
        }
    }

    /// Windows in traversal order
    pub fn to_vec(&self) -> Vec<Window> {
        self.iter().cloned().collect()
    }
}

impl FromIterator<Window> for WindowList {
    /// Collect windows already in report order
    fn from_iter<I: IntoIterator<Item = Window>>(iter: I) -> Self {
        Self {
            windows: iter.into_iter().collect(),
            order: Order::Report,
        }
    }
}

impl<'a> IntoIterator for &'a WindowList {
    type Item = &'a Window;
    type IntoIter = Box<dyn Iterator<Item = &'a Window> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Parse a full `list-windows` report.
///
/// The first malformed line rejects the whole report. The returned list walks
/// newest-first; call [`WindowList::invert`] for report order.
pub fn build_window_list(report: &str) -> Result<WindowList> {
    let mut list = WindowList::new();
    for line in report.split('\n').filter(|l| !l.is_empty()) {
        list.push(parse_window_line(line)?);
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(list: &WindowList) -> Vec<i32> {
        list.iter().map(|w| w.index).collect()
    }

    #[test]
    fn test_window_format_fields() {
        let fields: Vec<&str> = WINDOW_FORMAT.split('\t').collect();
        assert_eq!(
            fields,
            vec!["#{window_index}", "#{window_name}", "#{pane_current_path}"]
        );
    }

    #[test]
    fn test_parse_full_line() {
        let w = parse_window_line("2\tlogs\t/var/log").unwrap();
        assert_eq!(w, Window::new(2, "logs", "/var/log"));
    }

    #[test]
    fn test_parse_short_line_defaults() {
        let w = parse_window_line("4\teditor").unwrap();
        assert_eq!(w.index, 4);
        assert_eq!(w.name, "editor");
        assert_eq!(w.working_dir, "");

        let w = parse_window_line("5").unwrap();
        assert_eq!(w, Window::new(5, "", ""));
    }

    #[test]
    fn test_parse_index_is_lenient() {
        assert_eq!(parse_window_line("abc\tx\t/").unwrap().index, 0);
        assert_eq!(parse_window_line("\tx\t/").unwrap().index, 0);
        assert_eq!(parse_window_line("12abc\tx\t/").unwrap().index, 12);
        assert_eq!(parse_window_line(" -3\tx\t/").unwrap().index, -3);
        assert_eq!(parse_window_line("99999999999\tx\t/").unwrap().index, i32::MAX);
    }

    #[test]
    fn test_parse_keeps_empty_fields_in_place() {
        let w = parse_window_line("3\t\t/srv").unwrap();
        assert_eq!(w.name, "");
        assert_eq!(w.working_dir, "/srv");
    }

    #[test]
    fn test_parse_strips_carriage_return() {
        let w = parse_window_line("1\tmain\t/home\r").unwrap();
        assert_eq!(w.working_dir, "/home");
    }

    #[test]
    fn test_parse_rejects_extra_field() {
        let err = parse_window_line("1\tmain\t/home\textra").unwrap_err();
        match err {
            Error::MalformedReport { fields, .. } => assert_eq!(fields, 4),
            other => panic!("expected MalformedReport, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_truncates_long_fields() {
        let long_name = "n".repeat(NAME_CAPACITY + 20);
        let long_path = format!("/{}", "p".repeat(PATH_CAPACITY + 5));
        let w = parse_window_line(&format!("1\t{}\t{}", long_name, long_path)).unwrap();
        assert_eq!(w.name.len(), NAME_CAPACITY);
        assert_eq!(w.working_dir.len(), PATH_CAPACITY);
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let name = "é".repeat(NAME_CAPACITY);
        let w = Window::new(1, name, "/");
        assert!(w.name.len() <= NAME_CAPACITY);
        assert_eq!(w.name.chars().count(), NAME_CAPACITY / 2);
    }

    #[test]
    fn test_build_and_invert_order() {
        let report = "1\tmain\t/a\n2\tlogs\t/b\n3\teditor\t/c\n";
        let built = build_window_list(report).unwrap();
        assert_eq!(indices(&built), vec![3, 2, 1]);

        let ordered = built.invert();
        assert_eq!(indices(&ordered), vec![1, 2, 3]);
        assert_eq!(ordered.to_vec()[0].name, "main");

        let again = ordered.invert();
        assert_eq!(indices(&again), vec![3, 2, 1]);
    }

    #[test]
    fn test_build_skips_empty_lines() {
        let list = build_window_list("1\ta\t/\n\n2\tb\t/\n").unwrap().invert();
        assert_eq!(list.len(), 2);
        assert!(build_window_list("").unwrap().is_empty());
        assert!(build_window_list("\n").unwrap().is_empty());
    }

    #[test]
    fn test_build_rejects_whole_report_on_malformed_line() {
        let report = "1\tmain\t/a\n2\tlogs\t/b\tboom\n3\teditor\t/c\n";
        assert!(matches!(
            build_window_list(report),
            Err(Error::MalformedReport { .. })
        ));
    }

    #[test]
    fn test_single_report_line_from_executor_format() {
        let list = build_window_list("0\tmain\t/home\n").unwrap().invert();
        assert_eq!(list.to_vec(), vec![Window::new(0, "main", "/home")]);
    }
}
