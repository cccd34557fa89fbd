pub use crate::config::*;
use crate::EventState;

/// A builder for assembling an event.
///
/// Questions and choices are numbered in the order they are added.
///
/// ```
/// pub use weighted_voting::builder::Builder;
/// pub use weighted_voting::ElectoralRule;
/// # use weighted_voting::VotingError;
///
/// let mut event = Builder::new("Assemblée générale", ElectoralRule::Majority)?
///     .group("Groupe 1", 30, &[("amartin", "Martin"), ("bdurand", "Durand")])?
///     .group("Groupe 2", 70, &[("cpetit", "Petit")])?
///     .question("Approbation des comptes")
///     .choice("Pour")
///     .choice("Contre")
///     .procuration("bdurand", "amartin")
///     .build()?;
///
/// event.start()?;
/// event.cast_ballot("amartin", 1, &[1])?;
///
/// # Ok::<(), VotingError>(())
/// ```
pub struct Builder {
    pub(crate) _setup: EventSetup,
    pub(crate) _procurations: Vec<(String, String)>,
}

impl Builder {
    pub fn new(name: &str, rule: ElectoralRule) -> Result<Builder, VotingError> {
        Ok(Builder {
            _setup: EventSetup {
                name: name.to_string(),
                slug: slugify(name),
                rule,
                quorum: EventSetup::DEFAULT_QUORUM,
                groups: Vec::new(),
                questions: Vec::new(),
                choices: Vec::new(),
            },
            _procurations: Vec::new(),
        })
    }

    pub fn quorum(mut self, quorum: u32) -> Builder {
        self._setup.quorum = quorum;
        self
    }

    /// Adds a weighted group. Members are (username, last name) pairs.
    pub fn group(
        mut self,
        name: &str,
        weight: u32,
        members: &[(&str, &str)],
    ) -> Result<Builder, VotingError> {
        if weight > 100 {
            return Err(VotingError::InvalidGroupWeight {
                group: name.to_string(),
                weight,
            });
        }
        self._setup.groups.push(GroupSetup {
            name: name.to_string(),
            weight,
            members: members
                .iter()
                .map(|(username, last_name)| Member {
                    username: username.to_string(),
                    last_name: last_name.to_string(),
                })
                .collect(),
        });
        Ok(self)
    }

    /// Adds a question, numbered after the existing ones.
    pub fn question(mut self, text: &str) -> Builder {
        let number = self._setup.questions.len() as u32 + 1;
        self._setup.questions.push(QuestionSetup {
            number,
            text: text.to_string(),
        });
        self
    }

    /// Adds a choice, numbered after the existing ones.
    pub fn choice(mut self, text: &str) -> Builder {
        let number = self._setup.choices.len() as u32 + 1;
        self._setup.choices.push(ChoiceSetup {
            number,
            text: text.to_string(),
        });
        self
    }

    /// Stages a procuration, applied (and checked) at build time.
    pub fn procuration(mut self, from: &str, to: &str) -> Builder {
        self._procurations
            .push((from.to_string(), to.to_string()));
        self
    }

    pub fn build(self) -> Result<EventState, VotingError> {
        let mut event = EventState::new(&self._setup)?;
        for (from, to) in self._procurations.iter() {
            event.delegate(from, to)?;
        }
        Ok(event)
    }
}

// Lowercased, non-alphanumerics collapsed to single dashes.
fn slugify(name: &str) -> String {
    let mut out = String::new();
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugs() {
        assert_eq!(slugify("Assemblée générale 2023"), "assemblée-générale-2023");
        assert_eq!(slugify("  Conseil -- d'administration "), "conseil-d-administration");
    }
}
