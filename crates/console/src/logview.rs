use protocol::LogDirection;
use regex::Regex;

/// Accumulated log text for the active job plus the derived, filtered text
/// the view actually shows.
///
/// Head fetches return the window from the start of the file each time, so
/// a head poll replaces the buffer wholesale. Tail polls append the new
/// chunk. Flipping the direction abandons the old accumulation entirely.
///
/// The filter is always re-applied to the whole buffer, never to the
/// delta: the expression can change between polls and must apply uniformly
/// to everything on screen.
pub(crate) struct LogBuffer {
    unfiltered: String,
    rendered: String,
    filter_expr: String,
    filter: Option<Regex>,
    direction: LogDirection,
    pub(crate) lines: u32,
    pub(crate) pin_to_bottom: bool,
    pub(crate) auto_refresh: bool,
}

impl LogBuffer {
    pub(crate) fn new(lines: u32) -> Self {
        Self {
            unfiltered: String::new(),
            rendered: String::new(),
            filter_expr: String::new(),
            filter: None,
            direction: LogDirection::Tail,
            lines,
            pin_to_bottom: true,
            auto_refresh: true,
        }
    }

    /// Folds one fetched chunk into the buffer and re-renders. Returns true
    /// when the presentation layer should scroll to the bottom afterwards
    /// (a tail fetch with pin-to-bottom on); scrolling itself is the scroll
    /// controller's job, not ours.
    pub(crate) fn apply(&mut self, raw: &str, direction: LogDirection) -> bool {
        if direction != self.direction {
            self.direction = direction;
            self.unfiltered.clear();
        }
        match direction {
            LogDirection::Head => {
                self.unfiltered.clear();
                self.unfiltered.push_str(raw);
            }
            LogDirection::Tail => self.unfiltered.push_str(raw),
        }
        self.rendered = render_filtered(&self.unfiltered, self.filter.as_ref());
        self.pin_to_bottom && direction == LogDirection::Tail
    }

    /// Replaces the filter expression and re-renders the whole buffer. An
    /// invalid expression is reported to the caller and the previously
    /// rendered text stays on screen.
    pub(crate) fn set_filter(&mut self, expr: &str) -> Result<(), regex::Error> {
        let filter = compile_filter(expr)?;
        self.filter_expr = expr.to_string();
        self.filter = filter;
        self.rendered = render_filtered(&self.unfiltered, self.filter.as_ref());
        Ok(())
    }

    pub(crate) fn filter_expr(&self) -> &str {
        &self.filter_expr
    }

    pub(crate) fn direction(&self) -> LogDirection {
        self.direction
    }

    pub(crate) fn set_direction(&mut self, direction: LogDirection) {
        if direction != self.direction {
            self.direction = direction;
            self.unfiltered.clear();
            self.rendered.clear();
        }
    }

    pub(crate) fn rendered(&self) -> &str {
        &self.rendered
    }
}

/// An empty expression means no filtering. A leading `/` marks the rest of
/// the expression as a raw regex body; anything else is a substring match,
/// wrapped so each match covers the whole line around it.
pub(crate) fn compile_filter(expr: &str) -> Result<Option<Regex>, regex::Error> {
    if expr.is_empty() {
        return Ok(None);
    }
    let pattern = match expr.strip_prefix('/') {
        Some(raw) => raw.to_string(),
        None => format!(".*{expr}.*"),
    };
    Regex::new(&pattern).map(Some)
}

/// No filter passes the input through unchanged. With a filter, all matches
/// over the entire input are joined with newlines; no match on non-empty
/// input yields an empty result, which is a valid display state.
pub(crate) fn render_filtered(input: &str, filter: Option<&Regex>) -> String {
    match filter {
        None => input.to_string(),
        Some(regex) => regex
            .find_iter(input)
            .map(|found| found.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}
