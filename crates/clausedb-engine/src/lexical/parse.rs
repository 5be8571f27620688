//! Tokenising and shallow parsing of natural-language queries.
//!
//! The parse recognises comparison phrases, text-search markers, ordering
//! hints and the remaining content words (the query's "subject"). Words are
//! lower-cased, singularised and mapped through a small synonym table so that
//! "Companies" and "corporations" both become `company`.

use chrono::NaiveDate;
use clausedb_core::{
  coerce::{parse_date, parse_number},
  plan::Comparator,
};

// ─── Tokens ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Word {
  /// Lower-cased surface form.
  pub raw:  String,
  /// Singular, canonical form used for matching.
  pub norm: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
  Word(Word),
  Number(f64),
  Date(NaiveDate),
  /// Text inside matching quotes, case preserved.
  Quoted(String),
  /// A bare comparison symbol such as `>=`.
  Symbol(Comparator),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
  Number(f64),
  Date(NaiveDate),
  Text(String),
}

fn closing_quote(c: char) -> Option<char> {
  match c {
    '\'' => Some('\''),
    '"' => Some('"'),
    '‘' => Some('’'),
    '“' => Some('”'),
    _ => None,
  }
}

pub fn tokenize(text: &str) -> Vec<Token> {
  let chars: Vec<char> = text.chars().collect();
  let mut tokens = Vec::new();
  let mut i = 0;

  while i < chars.len() {
    let c = chars[i];
    if c.is_whitespace() {
      i += 1;
      continue;
    }

    if let Some(close) = closing_quote(c)
      && let Some(len) = chars[i + 1..].iter().position(|&d| d == close)
    {
      let inner: String = chars[i + 1..i + 1 + len].iter().collect();
      let inner = inner.trim();
      if !inner.is_empty() {
        tokens.push(Token::Quoted(inner.to_owned()));
      }
      i += len + 2;
      continue;
    }

    let start = i;
    while i < chars.len() && !chars[i].is_whitespace() {
      i += 1;
    }
    let chunk: String = chars[start..i].iter().collect();
    push_chunk(&chunk, &mut tokens);
  }

  tokens
}

fn push_chunk(chunk: &str, tokens: &mut Vec<Token>) {
  let trimmed = chunk.trim_matches(|c: char| matches!(c, '?' | '!' | ',' | ';' | ':' | '(' | ')' | '.'));
  if trimmed.is_empty() {
    return;
  }

  let symbol = match trimmed {
    ">" => Some(Comparator::Gt),
    ">=" => Some(Comparator::Ge),
    "<" => Some(Comparator::Lt),
    "<=" => Some(Comparator::Le),
    "=" | "==" => Some(Comparator::Eq),
    "!=" => Some(Comparator::Ne),
    _ => None,
  };
  if let Some(op) = symbol {
    tokens.push(Token::Symbol(op));
    return;
  }

  if trimmed.chars().any(|c| c.is_ascii_digit()) {
    if let Some(date) = parse_date(trimmed) {
      tokens.push(Token::Date(date));
      return;
    }
    if let Some(n) = parse_number(trimmed) {
      tokens.push(Token::Number(n));
      return;
    }
  }

  for raw in trimmed.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
    let raw = raw.to_lowercase();
    let norm = canonical(&singularize(&raw)).to_owned();
    tokens.push(Token::Word(Word { raw, norm }));
  }
}

// ─── Normalisation ───────────────────────────────────────────────────────────

const SINGULAR_EXCEPTIONS: &[&str] = &[
  "does", "always", "various", "across", "perhaps", "whereas", "yes", "thus", "towards", "news",
  "status", "basis", "terms", "series",
];

pub fn singularize(word: &str) -> String {
  if word.len() <= 3 || SINGULAR_EXCEPTIONS.contains(&word) {
    return word.to_owned();
  }
  if let Some(stem) = word.strip_suffix("ies") {
    return format!("{stem}y");
  }
  for suffix in ["sses", "xes", "ches", "shes"] {
    if word.ends_with(suffix) {
      return word[..word.len() - 2].to_owned();
    }
  }
  if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
    return word.to_owned();
  }
  word.strip_suffix('s').unwrap_or(word).to_owned()
}

const SYNONYMS: &[(&str, &str)] = &[
  ("corporation", "company"),
  ("firm", "company"),
  ("business", "company"),
  ("organization", "company"),
  ("organisation", "company"),
  ("enterprise", "company"),
  ("expiry", "expiration"),
  ("percent", "percentage"),
  ("sum", "amount"),
];

pub fn canonical(word: &str) -> &str {
  SYNONYMS
    .iter()
    .find(|(alias, _)| *alias == word)
    .map_or(word, |(_, target)| target)
}

const STOPWORDS: &[&str] = &[
  "a", "an", "the", "what", "which", "who", "whom", "whose", "where", "when", "why", "how", "is",
  "are", "was", "were", "be", "been", "being", "do", "does", "did", "show", "me", "list", "find",
  "get", "give", "return", "display", "fetch", "retrieve", "all", "any", "every", "each", "some",
  "of", "for", "in", "on", "at", "with", "without", "that", "those", "these", "this", "there",
  "their", "its", "it", "and", "or", "by", "to", "from", "please", "i", "we", "you", "my", "our",
  "your", "want", "need", "know", "see", "tell", "clause", "contract", "agreement", "provision",
  "document", "section", "value", "information", "info", "detail", "record", "row", "entry",
  "field", "column", "data", "have", "has", "having", "can", "could", "would", "should", "will",
  "shall", "may", "might", "must", "much", "many", "also", "only", "just", "than", "then", "as",
  "per", "s", "not", "no", "yes", "specified", "stated", "listed", "given", "exist",
  "present", "non", "null", "empty", "greater", "more", "higher", "larger", "over", "above",
  "exceeding", "exceed", "after", "later", "least", "less", "fewer", "lower", "smaller", "under",
  "below", "before", "earlier", "most", "up", "equal", "exactly", "sort", "sorted", "order",
  "ordered", "ascending", "descending", "asc", "desc", "highest", "lowest", "largest",
  "smallest", "biggest", "top", "bottom", "first", "last", "between", "them", "they",
];

pub fn is_stopword(word: &str) -> bool { STOPWORDS.contains(&word) }

// ─── Parse ───────────────────────────────────────────────────────────────────

/// How a text-search phrase was introduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMarker {
  /// "mentioning", "about", "regarding": always searches the clause text.
  Mention,
  /// "containing", "including", "named": searches a field when one precedes.
  Contains,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Search {
  pub at:     usize,
  pub marker: SearchMarker,
  pub phrase: String,
  pub quoted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
  pub at:      usize,
  pub op:      Comparator,
  pub operand: Option<Literal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderHint {
  pub at:         usize,
  pub descending: bool,
}

/// A content word with its token position.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectWord {
  pub at:   usize,
  pub word: Word,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parsed {
  pub tokens:      Vec<Token>,
  pub subject:     Vec<SubjectWord>,
  pub searches:    Vec<Search>,
  pub comparisons: Vec<Comparison>,
  pub order:       Option<OrderHint>,
}

impl Parsed {
  /// Distinct normalised subject words, in query order.
  pub fn subject_norms(&self) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for sw in &self.subject {
      if !out.contains(&sw.word.norm.as_str()) {
        out.push(&sw.word.norm);
      }
    }
    out
  }
}

const COMPARATOR_PHRASES: &[(&[&str], Comparator)] = &[
  (&["no", "less", "than"], Comparator::Ge),
  (&["no", "more", "than"], Comparator::Le),
  (&["not", "equal", "to"], Comparator::Ne),
  (&["greater", "than"], Comparator::Gt),
  (&["more", "than"], Comparator::Gt),
  (&["higher", "than"], Comparator::Gt),
  (&["larger", "than"], Comparator::Gt),
  (&["later", "than"], Comparator::Gt),
  (&["less", "than"], Comparator::Lt),
  (&["fewer", "than"], Comparator::Lt),
  (&["lower", "than"], Comparator::Lt),
  (&["smaller", "than"], Comparator::Lt),
  (&["earlier", "than"], Comparator::Lt),
  (&["at", "least"], Comparator::Ge),
  (&["at", "most"], Comparator::Le),
  (&["up", "to"], Comparator::Le),
  (&["equal", "to"], Comparator::Eq),
  (&["over"], Comparator::Gt),
  (&["above"], Comparator::Gt),
  (&["exceeding"], Comparator::Gt),
  (&["exceed"], Comparator::Gt),
  (&["after"], Comparator::Gt),
  (&["under"], Comparator::Lt),
  (&["below"], Comparator::Lt),
  (&["before"], Comparator::Lt),
  (&["equal"], Comparator::Eq),
  (&["exactly"], Comparator::Eq),
  (&["is"], Comparator::Eq),
];

const MENTION_MARKERS: &[&str] = &["mention", "mentioning", "mentioned", "about", "regarding", "referencing"];
const CONTAINS_MARKERS: &[&str] = &["containing", "contain", "including", "include", "named"];
const DESCENDING_MARKERS: &[&str] = &["highest", "largest", "biggest", "top"];
const ASCENDING_MARKERS: &[&str] = &["lowest", "smallest", "bottom"];

fn norm_at(tokens: &[Token], i: usize) -> Option<&str> {
  match tokens.get(i) {
    Some(Token::Word(w)) => Some(&w.norm),
    _ => None,
  }
}

fn literal_at(tokens: &[Token], i: usize) -> Option<Literal> {
  match tokens.get(i)? {
    Token::Number(n) => Some(Literal::Number(*n)),
    Token::Date(d) => Some(Literal::Date(*d)),
    Token::Quoted(s) => Some(Literal::Text(s.clone())),
    _ => None,
  }
}

fn comparator_at(tokens: &[Token], i: usize) -> Option<(usize, Comparator)> {
  if let Some(Token::Symbol(op)) = tokens.get(i) {
    return Some((1, *op));
  }
  COMPARATOR_PHRASES.iter().find_map(|(phrase, op)| {
    let matched = phrase
      .iter()
      .enumerate()
      .all(|(k, w)| norm_at(tokens, i + k) == Some(*w));
    matched.then_some((phrase.len(), *op))
  })
}

fn is_marker(norm: &str) -> bool {
  MENTION_MARKERS.contains(&norm) || CONTAINS_MARKERS.contains(&norm)
}

pub fn parse(text: &str) -> Parsed {
  let tokens = tokenize(text);
  let mut parsed = Parsed::default();
  let mut i = 0;

  while i < tokens.len() {
    if let Some((len, op)) = comparator_at(&tokens, i) {
      let operand = literal_at(&tokens, i + len);
      // "is" only compares when a literal follows; otherwise it is filler.
      let bare_is = len == 1 && norm_at(&tokens, i) == Some("is");
      if operand.is_some() || !bare_is {
        let consumed = len + usize::from(operand.is_some());
        parsed.comparisons.push(Comparison { at: i, op, operand });
        i += consumed;
        continue;
      }
    }

    let Some(Token::Word(word)) = tokens.get(i) else {
      i += 1;
      continue;
    };
    let norm = word.norm.as_str();

    if is_marker(norm) {
      let marker = if MENTION_MARKERS.contains(&norm) {
        SearchMarker::Mention
      } else {
        SearchMarker::Contains
      };
      let mut j = i + 1;
      if let Some(Token::Quoted(q)) = tokens.get(j) {
        parsed.searches.push(Search { at: i, marker, phrase: q.clone(), quoted: true });
        i = j + 1;
        continue;
      }
      // Skip filler ("mentioning the ...") then take the run of content words.
      while matches!(norm_at(&tokens, j), Some(w) if is_stopword(w) && comparator_at(&tokens, j).is_none()) {
        j += 1;
      }
      let mut words = Vec::new();
      while let Some(Token::Word(w)) = tokens.get(j) {
        if is_stopword(&w.norm) || is_marker(&w.norm) {
          break;
        }
        words.push(w.raw.clone());
        j += 1;
      }
      if !words.is_empty() {
        parsed.searches.push(Search { at: i, marker, phrase: words.join(" "), quoted: false });
      }
      i = j.max(i + 1);
      continue;
    }

    if matches!(norm, "sort" | "sorted" | "order" | "ordered") && norm_at(&tokens, i + 1) == Some("by") {
      parsed.order.get_or_insert(OrderHint { at: i, descending: false });
      i += 2;
      continue;
    }
    if DESCENDING_MARKERS.contains(&norm) || ASCENDING_MARKERS.contains(&norm) {
      parsed
        .order
        .get_or_insert(OrderHint { at: i, descending: DESCENDING_MARKERS.contains(&norm) });
      i += 1;
      continue;
    }
    if matches!(norm, "descending" | "desc") {
      parsed.order.get_or_insert(OrderHint { at: i, descending: true }).descending = true;
      i += 1;
      continue;
    }
    if matches!(norm, "ascending" | "asc") {
      parsed.order.get_or_insert(OrderHint { at: i, descending: false }).descending = false;
      i += 1;
      continue;
    }

    if !is_stopword(norm) {
      parsed.subject.push(SubjectWord { at: i, word: word.clone() });
    }
    i += 1;
  }

  parsed
}
