pub mod html;


/// Result of parsing a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseResult {
    /// Extracted heading texts, in h1..h6 order
    pub headings: Vec<String>,
    /// Extracted absolute links
    pub links: Vec<String>,
}

impl ParseResult {
    /// Creates a new parse result with the given headings and links
    pub fn new(headings: Vec<String>, links: Vec<String>) -> Self {
        Self { headings, links }
    }
}
