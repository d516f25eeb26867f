use crate::model::{TotalsAccumulator, TourRecord};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Placeholder names recognised inside template cells.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Token {
    TourName,
    DepartureTime,
    Notes,
    NumAdult,
    NumChd,
    NumComp,
    TotalAdult,
    TotalChd,
    TotalComp,
}

impl Token {
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn is_count(self) -> bool {
        matches!(self, Token::NumAdult | Token::NumChd | Token::NumComp)
    }

    pub fn is_total(self) -> bool {
        matches!(self, Token::TotalAdult | Token::TotalChd | Token::TotalComp)
    }

    pub fn is_section_token(self) -> bool {
        !self.is_total()
    }
}

/// The value a token resolves to for one record.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    Text(String),
    Count(u64),
}

impl TokenValue {
    pub fn render(&self) -> String {
        match self {
            TokenValue::Text(text) => text.clone(),
            TokenValue::Count(count) => count.to_string(),
        }
    }
}

/// Literal token markers, built once and shared by reference.
#[derive(Debug, Clone)]
pub struct TokenVocabulary {
    literals: Vec<(Token, String)>,
}

impl Default for TokenVocabulary {
    fn default() -> Self {
        Self::standard()
    }
}

impl TokenVocabulary {
    /// `{{name}}` markers, double braces included.
    pub fn standard() -> Self {
        let literals = Token::iter()
            .map(|token| (token, format!("{{{{{}}}}}", token.name())))
            .collect();
        Self { literals }
    }

    pub fn literal(&self, token: Token) -> &str {
        self.literals
            .iter()
            .find(|(candidate, _)| *candidate == token)
            .map(|(_, literal)| literal.as_str())
            .unwrap_or_default()
    }

    /// The token the text consists of, ignoring surrounding whitespace.
    pub fn exact(&self, text: &str) -> Option<Token> {
        let trimmed = text.trim();
        self.literals
            .iter()
            .find(|(_, literal)| literal == trimmed)
            .map(|(token, _)| *token)
    }

    /// Every token contained in the text, in vocabulary order.
    pub fn contained(&self, text: &str) -> Vec<Token> {
        if !text.contains("{{") {
            return Vec::new();
        }
        self.literals
            .iter()
            .filter(|(_, literal)| text.contains(literal.as_str()))
            .map(|(token, _)| *token)
            .collect()
    }

    pub fn contains_any(&self, text: &str) -> bool {
        !self.contained(text).is_empty()
    }

    pub fn contains_section_token(&self, text: &str) -> bool {
        self.contained(text)
            .into_iter()
            .any(Token::is_section_token)
    }

    /// Replaces every occurrence of `token` inside `text`.
    pub fn replace(&self, text: &str, token: Token, value: &TokenValue) -> String {
        text.replace(self.literal(token), &value.render())
    }

    pub fn record_value(&self, token: Token, record: &TourRecord) -> Option<TokenValue> {
        Some(match token {
            Token::TourName => TokenValue::Text(record.name.clone()),
            Token::DepartureTime => TokenValue::Text(record.departure_time.clone()),
            Token::Notes => TokenValue::Text(record.notes.clone()),
            Token::NumAdult => TokenValue::Count(u64::from(record.adult_count)),
            Token::NumChd => TokenValue::Count(u64::from(record.child_count)),
            Token::NumComp => TokenValue::Count(u64::from(record.comp_count)),
            Token::TotalAdult | Token::TotalChd | Token::TotalComp => return None,
        })
    }

    pub fn totals_value(&self, token: Token, totals: &TotalsAccumulator) -> Option<TokenValue> {
        Some(match token {
            Token::TotalAdult => TokenValue::Count(totals.adults),
            Token::TotalChd => TokenValue::Count(totals.children),
            Token::TotalComp => TokenValue::Count(totals.comp),
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_keep_double_braces() {
        let vocab = TokenVocabulary::standard();
        assert_eq!(vocab.literal(Token::TourName), "{{tour_name}}");
        assert_eq!(vocab.literal(Token::NumChd), "{{num_chd}}");
        assert_eq!(vocab.literal(Token::TotalComp), "{{total_comp}}");
    }

    #[test]
    fn exact_and_contained_matching() {
        let vocab = TokenVocabulary::standard();
        assert_eq!(vocab.exact(" {{num_adult}} "), Some(Token::NumAdult));
        assert_eq!(vocab.exact("Adults: {{num_adult}}"), None);
        assert_eq!(
            vocab.contained("{{tour_name}} at {{departure_time}}"),
            vec![Token::TourName, Token::DepartureTime]
        );
        assert!(vocab.contained("{tour_name}").is_empty());
        assert!(vocab.contains_section_token("x {{notes}}"));
        assert!(!vocab.contains_section_token("{{total_adult}}"));
    }

    #[test]
    fn record_values_resolve_per_token() {
        let vocab = TokenVocabulary::standard();
        let record = TourRecord::new("Glacier").with_counts(2, 1, 0);
        assert_eq!(
            vocab.record_value(Token::TourName, &record),
            Some(TokenValue::Text("Glacier".into()))
        );
        assert_eq!(
            vocab.record_value(Token::NumChd, &record),
            Some(TokenValue::Count(1))
        );
        assert_eq!(vocab.record_value(Token::TotalAdult, &record), None);
        assert_eq!(
            vocab.replace("Tour: {{tour_name}}", Token::TourName, &TokenValue::Text("A".into())),
            "Tour: A"
        );
    }
}
