use std::fmt;
use std::str::FromStr;

use crate::driver::Locator;
use crate::game::GameError;

/// Reply to a regular question. Parsing is exact and case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Answer {
    Yes,
    No,
    DontKnow,
    Probably,
    ProbablyNot,
}

impl Answer {
    pub const ALL: [Answer; 5] = [
        Answer::Yes,
        Answer::No,
        Answer::DontKnow,
        Answer::Probably,
        Answer::ProbablyNot,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Answer::Yes => "Yes",
            Answer::No => "No",
            Answer::DontKnow => "I don't know",
            Answer::Probably => "Probably",
            Answer::ProbablyNot => "Probably not",
        }
    }

    pub fn button(self) -> Locator {
        match self {
            Answer::Yes => Locator::id("a_yes"),
            Answer::No => Locator::id("a_no"),
            Answer::DontKnow => Locator::id("a_dont_know"),
            Answer::Probably => Locator::id("a_probably"),
            // sic, the site's own id
            Answer::ProbablyNot => Locator::id("a_probaly_not"),
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Answer {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Answer::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| {
                let choices: Vec<_> = Answer::ALL.iter().map(|a| a.as_str()).collect();
                GameError::InvalidAnswer(format!("Invalid answer. Use one of: {}", choices.join(", ")))
            })
    }
}

/// Reply to a proposed character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessReply {
    Yes,
    No,
}

impl GuessReply {
    pub fn button(self) -> Locator {
        match self {
            GuessReply::Yes => Locator::id("a_propose_yes"),
            GuessReply::No => Locator::id("a_propose_no"),
        }
    }
}

impl fmt::Display for GuessReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GuessReply::Yes => "Yes",
            GuessReply::No => "No",
        })
    }
}

impl FromStr for GuessReply {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "1" || s.eq_ignore_ascii_case("yes") {
            Ok(GuessReply::Yes)
        } else if s == "0" || s.eq_ignore_ascii_case("no") {
            Ok(GuessReply::No)
        } else {
            Err(GameError::InvalidAnswer(
                "For character guess, use: Yes, No, 1, or 0".into(),
            ))
        }
    }
}

/// Shown after a rejected guess, asking whether to keep playing. Either
/// control resumes the game.
pub const CONTINUE_BUTTONS: [Locator; 2] = [Locator::id("a_continue_yes"), Locator::id("a_continue_no")];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_answer_buttons_total_and_distinct() {
        let expected = [
            ("Yes", "#a_yes"),
            ("No", "#a_no"),
            ("I don't know", "#a_dont_know"),
            ("Probably", "#a_probably"),
            ("Probably not", "#a_probaly_not"),
        ];

        let mut seen = HashSet::new();
        for (input, button) in expected {
            let answer: Answer = input.parse().unwrap();
            assert_eq!(answer.as_str(), input);
            assert_eq!(answer.button().to_string(), button);
            assert!(seen.insert(answer.button()), "{input} shares a button");
        }
        assert_eq!(seen.len(), Answer::ALL.len());
    }

    #[test]
    fn test_answer_parse_is_exact() {
        for input in ["yes", "YES", " Yes", "probably not", "Maybe", "1", ""] {
            let err = input.parse::<Answer>().unwrap_err();
            assert_eq!(
                err.to_string(),
                "Invalid answer. Use one of: Yes, No, I don't know, Probably, Probably not"
            );
        }
    }

    #[test]
    fn test_guess_reply_normalization() {
        for input in ["1", "yes", "Yes", "YES"] {
            assert_eq!(input.parse::<GuessReply>().unwrap(), GuessReply::Yes);
        }
        for input in ["0", "no", "No", "nO"] {
            assert_eq!(input.parse::<GuessReply>().unwrap(), GuessReply::No);
        }
        for input in ["2", "maybe", "Probably", "y", ""] {
            assert!(matches!(
                input.parse::<GuessReply>(),
                Err(GameError::InvalidAnswer(_))
            ));
        }
    }

    #[test]
    fn test_guess_buttons_distinct() {
        assert_ne!(GuessReply::Yes.button(), GuessReply::No.button());
        assert_eq!(GuessReply::No.button().to_string(), "#a_propose_no");
    }
}
