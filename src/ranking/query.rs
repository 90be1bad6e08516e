//! Query construction for relevance ranking.
//!
//! [`build_query`] turns free text into a [`QueryAst`] without touching any
//! index, so the scorer behind the relevance ranker stays swappable.
//! [`tokenize`] is shared with the index so query terms and indexed terms
//! are produced by the same rules.

/// Fields of a package that are indexed for relevance scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Package id.
    Id,
    /// Version string.
    Version,
    /// Title.
    Title,
    /// Description.
    Description,
    /// Summary.
    Summary,
    /// Tags.
    Tags,
}

impl Field {
    /// Every indexed field.
    pub const ALL: [Field; 6] = [
        Field::Id,
        Field::Version,
        Field::Title,
        Field::Description,
        Field::Summary,
        Field::Tags,
    ];

    fn from_qualifier(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "id" => Some(Self::Id),
            "version" => Some(Self::Version),
            "title" => Some(Self::Title),
            "description" => Some(Self::Description),
            "summary" => Some(Self::Summary),
            "tags" | "tag" => Some(Self::Tags),
            _ => None,
        }
    }
}

/// One clause of a query. Clauses are OR-ed; each matching clause adds to a
/// document's score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// A token, optionally restricted to one field.
    Term {
        /// Field restriction, `None` for every field.
        field: Option<Field>,
        /// Lowercased token.
        token: String,
    },
    /// `packageid:` qualifier: the id must equal this value (case-insensitive).
    ExactId(String),
}

/// A parsed query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryAst {
    /// The clauses of the query.
    pub clauses: Vec<Clause>,
}

impl QueryAst {
    /// Whether the query has nothing to match.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Parse free text into a query.
///
/// Whitespace separates terms; `field:value` restricts a term to one field;
/// double quotes keep a value with spaces together. Unknown qualifiers are
/// treated as plain text.
pub fn build_query(text: &str) -> QueryAst {
    let mut clauses = Vec::new();

    for segment in split_segments(text) {
        let qualified = segment
            .split_once(':')
            .filter(|(name, value)| !name.is_empty() && !value.is_empty());

        match qualified {
            Some((name, value)) if name.eq_ignore_ascii_case("packageid") => {
                clauses.push(Clause::ExactId(value.trim().to_lowercase()));
            }
            Some((name, value)) if Field::from_qualifier(name).is_some() => {
                let field = Field::from_qualifier(name);
                clauses.extend(
                    tokenize(value)
                        .into_iter()
                        .map(|token| Clause::Term { field, token }),
                );
            }
            _ => {
                let tokens = tokenize(&segment);
                let whole = segment.to_lowercase();
                if tokens.len() > 1 && !whole.contains(char::is_whitespace) {
                    clauses.push(Clause::Term {
                        field: Some(Field::Id),
                        token: whole,
                    });
                }
                clauses.extend(
                    tokens
                        .into_iter()
                        .map(|token| Clause::Term { field: None, token }),
                );
            }
        }
    }

    QueryAst { clauses }
}

/// Split query text on whitespace, honouring double quotes.
fn split_segments(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in text.chars() {
        match c {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Tokenise text for indexing and querying.
///
/// Splits on non-alphanumeric characters and lowercases. Words with
/// camel-case humps also yield each hump (`JsonConvert` yields `json`,
/// `convert` and `jsonconvert`).
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let humps = camel_humps(word);
        if humps.len() > 1 {
            tokens.extend(humps.iter().map(|h| h.to_lowercase()));
        }
        tokens.push(word.to_lowercase());
    }
    tokens
}

fn camel_humps(word: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = word.char_indices().collect();
    let mut humps = Vec::new();
    let mut start = 0;

    for i in 1..chars.len() {
        let (idx, c) = chars[i];
        let prev = chars[i - 1].1;
        let next_lower = chars.get(i + 1).is_some_and(|(_, n)| n.is_lowercase());
        let boundary = c.is_uppercase()
            && (prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower));
        if boundary {
            humps.push(&word[start..idx]);
            start = idx;
        }
    }
    humps.push(&word[start..]);
    humps
}
