//! Domain models for the shared book inventory
//!
//! `Book` is the display value used everywhere above the repositories.
//! The `*Record` types mirror what is actually stored under `Books/`,
//! `Users/` and `Wishlist/`, including the loose shapes older clients
//! wrote (a single owner stored as a bare string, lists stored as
//! index-keyed objects).

use crate::error::{LibraryError, Result};
use bridge_traits::realtime::{sorted_children, validate_key};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
pub const UNKNOWN_GENRE: &str = "Unknown Genre";
pub const UNKNOWN_USER: &str = "Unknown User";

/// Separator used when several authors are shown as one string.
pub const AUTHOR_SEPARATOR: &str = ", ";

/// Placeholder some clients stored instead of leaving the cover empty.
const LEGACY_NO_IMAGE: &str = "No image available";

fn non_blank_or(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

// =============================================================================
// ISBN
// =============================================================================

/// Validated ISBN, always held as 13 digits.
///
/// Accepts ISBN-10 (check digit may be `X`) or ISBN-13, with optional
/// hyphens and spaces. ISBN-10 input is converted to its `978` ISBN-13 form.
///
/// ```
/// use core_library::models::Isbn;
///
/// let isbn: Isbn = "0-441-01359-7".parse().unwrap();
/// assert_eq!(isbn.as_str(), "9780441013593");
/// assert!("9780441013594".parse::<Isbn>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Isbn(String);

impl Isbn {
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| LibraryError::InvalidIsbn {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let compact: String = input
            .chars()
            .filter(|c| *c != '-' && !c.is_whitespace())
            .collect();

        if !compact.is_ascii() {
            return Err(invalid("only digits and X are allowed"));
        }

        match compact.len() {
            10 => {
                let (body, check) = compact.split_at(9);
                if !body.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid("ISBN-10 must start with nine digits"));
                }
                let check = match check {
                    "X" | "x" => 10,
                    digit => digit
                        .parse::<u32>()
                        .map_err(|_| invalid("ISBN-10 check digit must be 0-9 or X"))?,
                };
                let sum: u32 = digits(body)
                    .zip((2..=10).rev())
                    .map(|(d, weight)| d * weight)
                    .sum::<u32>()
                    + check;
                if sum % 11 != 0 {
                    return Err(invalid("ISBN-10 check digit mismatch"));
                }
                let prefixed = format!("978{body}");
                let check13 = isbn13_check_digit(&prefixed);
                Ok(Self(format!("{prefixed}{check13}")))
            }
            13 => {
                if !compact.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid("ISBN-13 must contain only digits"));
                }
                let (body, check) = compact.split_at(12);
                if check.parse::<u32>().ok() != Some(isbn13_check_digit(body)) {
                    return Err(invalid("ISBN-13 check digit mismatch"));
                }
                Ok(Self(compact))
            }
            _ => Err(invalid("expected 10 or 13 digits")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

fn digits(s: &str) -> impl Iterator<Item = u32> + '_ {
    s.chars().filter_map(|c| c.to_digit(10))
}

fn isbn13_check_digit(first_twelve: &str) -> u32 {
    let sum: u32 = digits(first_twelve)
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d } else { d * 3 })
        .sum();
    (10 - sum % 10) % 10
}

impl FromStr for Isbn {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Isbn {
    type Error = LibraryError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Isbn> for String {
    fn from(isbn: Isbn) -> Self {
        isbn.0
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable id for catalog results that carry no ISBN.
///
/// Uses the 32-bit string hash over UTF-16 code units
/// (`h = 31 * h + unit`), so ids match those other clients already stored.
pub fn fallback_isbn_for_title(title: &str) -> String {
    let hash = title
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
    format!("{FALLBACK_ISBN_PREFIX}{hash}")
}

/// Prefix of ids produced by [`fallback_isbn_for_title`].
pub const FALLBACK_ISBN_PREFIX: &str = "no_isbn_";

/// Key under which a book is stored in `Books` and `Wishlist`.
///
/// Fallback ids pass through as-is; anything else must be a valid ISBN and
/// is stored in its ISBN-13 form.
pub fn normalize_book_key(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with(FALLBACK_ISBN_PREFIX) {
        return Ok(trimmed.to_string());
    }
    Ok(Isbn::parse(trimmed)?.into_inner())
}

// =============================================================================
// Book
// =============================================================================

/// A book as shown to the user.
///
/// Missing fields are replaced with display defaults on construction, so
/// `title`, `authors` and `genre` are never blank. `cover_url` may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Book {
    pub isbn: String,
    pub title: String,
    /// Authors joined with [`AUTHOR_SEPARATOR`].
    pub authors: String,
    pub cover_url: String,
    pub genre: String,
}

impl Book {
    /// Book with every field at its default.
    pub fn new(isbn: impl Into<String>) -> Self {
        Self {
            isbn: isbn.into(),
            title: UNKNOWN_TITLE.to_string(),
            authors: UNKNOWN_AUTHOR.to_string(),
            cover_url: String::new(),
            genre: UNKNOWN_GENRE.to_string(),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = non_blank_or(Some(title), UNKNOWN_TITLE);
        self
    }

    pub fn with_authors<S: AsRef<str>>(mut self, authors: &[S]) -> Self {
        self.authors = join_authors(authors);
        self
    }

    pub fn with_cover_url(mut self, cover_url: &str) -> Self {
        self.cover_url = normalize_cover(cover_url);
        self
    }

    pub fn with_genre(mut self, genre: &str) -> Self {
        self.genre = non_blank_or(Some(genre), UNKNOWN_GENRE);
        self
    }

    /// Individual author names, without the "Unknown Author" placeholder.
    pub fn author_names(&self) -> Vec<&str> {
        self.authors
            .split(AUTHOR_SEPARATOR)
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != UNKNOWN_AUTHOR)
            .collect()
    }

    pub fn has_cover(&self) -> bool {
        !self.cover_url.trim().is_empty()
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.isbn.trim().is_empty() {
            return Err("Book ISBN cannot be empty".to_string());
        }
        validate_key(&self.isbn).map_err(|e| format!("Book ISBN is not a valid key: {e}"))?;
        if self.title.trim().is_empty() {
            return Err("Book title cannot be empty".to_string());
        }
        Ok(())
    }
}

fn join_authors<S: AsRef<str>>(authors: &[S]) -> String {
    let names: Vec<&str> = authors
        .iter()
        .map(|a| a.as_ref().trim())
        .filter(|a| !a.is_empty())
        .collect();
    if names.is_empty() {
        UNKNOWN_AUTHOR.to_string()
    } else {
        names.join(AUTHOR_SEPARATOR)
    }
}

fn normalize_cover(cover_url: &str) -> String {
    let trimmed = cover_url.trim();
    if trimmed == LEGACY_NO_IMAGE {
        String::new()
    } else {
        trimmed.to_string()
    }
}

// =============================================================================
// Stored records
// =============================================================================

/// Reads a list that may have been stored as a bare string, an array, or
/// an index-keyed object. Blank entries are dropped.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    fn scalar(value: &Value) -> Option<String> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar).collect(),
        Some(object @ Value::Object(_)) => sorted_children(object.clone())
            .iter()
            .filter_map(|(_, v)| scalar(v))
            .collect(),
        Some(other) => scalar(other).into_iter().collect(),
        None => Vec::new(),
    }
}

fn deserialize_string_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(string_list(Some(&value)))
}

fn deserialize_lenient_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

pub(crate) fn from_node<T: for<'de> Deserialize<'de>>(path: &str, node: Value) -> Result<T> {
    serde_json::from_value(node).map_err(|source| LibraryError::Serialization {
        path: path.to_string(),
        source,
    })
}

/// `Books/{isbn}` as stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BookRecord {
    #[serde(default)]
    pub isbn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub authors: Vec<String>,
    #[serde(
        rename = "bookImageUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    /// Owner uids.
    #[serde(rename = "uid", default, deserialize_with = "deserialize_string_list")]
    pub owners: Vec<String>,
}

impl BookRecord {
    pub fn from_book(book: &Book, owners: Vec<String>) -> Self {
        Self {
            isbn: book.isbn.clone(),
            title: Some(book.title.clone()),
            authors: book.author_names().into_iter().map(String::from).collect(),
            cover_url: Some(book.cover_url.clone()),
            genre: Some(book.genre.clone()),
            owners,
        }
    }

    /// Display value. `key` is the node key, used when the stored record
    /// has no `isbn` field.
    pub fn to_book(&self, key: &str) -> Book {
        let isbn = if self.isbn.trim().is_empty() {
            key
        } else {
            self.isbn.trim()
        };
        Book::new(isbn)
            .with_title(self.title.as_deref().unwrap_or_default())
            .with_authors(&self.authors)
            .with_cover_url(self.cover_url.as_deref().unwrap_or_default())
            .with_genre(self.genre.as_deref().unwrap_or_default())
    }

    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.owners.iter().any(|owner| owner == uid)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// `Users/{uid}` as stored. Every field is optional on read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub username: String,
    #[serde(rename = "mobileNumber")]
    pub mobile_number: String,
    #[serde(rename = "homeAddress")]
    pub home_address: String,
    #[serde(deserialize_with = "deserialize_string_list")]
    pub my_books: Vec<String>,
    #[serde(deserialize_with = "deserialize_lenient_i64")]
    pub swaps: i64,
}

impl UserProfile {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            ..Self::default()
        }
    }

    /// Name shown next to this user: full name, then username, then
    /// [`UNKNOWN_USER`].
    pub fn display_name(&self) -> String {
        let name = non_blank_or(Some(&self.name), "");
        if !name.is_empty() {
            return name;
        }
        non_blank_or(Some(&self.username), UNKNOWN_USER)
    }

    pub fn has_address(&self) -> bool {
        !self.home_address.trim().is_empty()
    }

    /// Contact fields only. `my_books` and `swaps` are owned by the
    /// inventory operations and never overwritten by a profile save.
    pub fn profile_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("uid".to_string(), Value::String(self.uid.clone()));
        fields.insert("email".to_string(), Value::String(self.email.clone()));
        fields.insert("name".to_string(), Value::String(self.name.clone()));
        fields.insert("username".to_string(), Value::String(self.username.clone()));
        fields.insert(
            "mobileNumber".to_string(),
            Value::String(self.mobile_number.clone()),
        );
        fields.insert(
            "homeAddress".to_string(),
            Value::String(self.home_address.clone()),
        );
        fields
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.uid.trim().is_empty() {
            return Err("User id cannot be empty".to_string());
        }
        validate_key(&self.uid).map_err(|e| format!("User id is not a valid key: {e}"))?;
        if !self.email.is_empty() && !self.email.contains('@') {
            return Err(format!("Email '{}' is not an address", self.email));
        }
        if self.swaps < 0 {
            return Err("Swap count cannot be negative".to_string());
        }
        Ok(())
    }
}

/// `Wishlist/{isbn}` as stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WishlistRecord {
    #[serde(default)]
    pub isbn: String,
    #[serde(rename = "uid", default, deserialize_with = "deserialize_string_list")]
    pub users: Vec<String>,
}
