use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Short code naming one Gemini (project, workspace) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub enum Selector {
  Esup,
  Uat,
  Rff,
  Dir,
}

impl Selector {
  pub const ALL: [Selector; 4] = [Selector::Esup, Selector::Uat, Selector::Rff, Selector::Dir];

  pub fn code(self) -> &'static str {
    match self {
      Selector::Esup => "ESUP",
      Selector::Uat => "UAT",
      Selector::Rff => "RFF",
      Selector::Dir => "DIR",
    }
  }
}

impl fmt::Display for Selector {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.code())
  }
}

impl FromStr for Selector {
  type Err = Error;

  /// Case-insensitive: `esup`, `Esup` and `ESUP` all resolve to the same selector.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let upper = s.trim().to_uppercase();
    Selector::ALL
      .into_iter()
      .find(|sel| sel.code() == upper)
      .ok_or_else(|| Error::UnknownSelector(s.to_string()))
  }
}

impl TryFrom<String> for Selector {
  type Error = Error;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}
