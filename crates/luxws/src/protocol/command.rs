//! LuxWS request commands.
//!
//! Every request is a single text frame of the form `<VERB>;<argument>`.
//! Only two verbs are used:
//!
//! | Command            | Reply root   |
//! |--------------------|--------------|
//! | `LOGIN;<password>` | `navigation` |
//! | `GET;<id>`         | `content`    |

use std::fmt;

/// The logical kind of reply a command expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Navigation,
    Content,
}

impl Kind {
    /// Lowercase root tag a reply of this kind carries.
    pub fn root_tag(self) -> &'static str {
        match self {
            Kind::Navigation => "navigation",
            Kind::Content => "content",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root_tag())
    }
}

/// A request sent to the controller.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Authenticate and receive the navigation tree.  The password may be
    /// empty.
    Login { password: &'a str },
    /// Fetch the content page with a connection-scoped identifier.
    Get { id: &'a str },
}

impl Command<'_> {
    /// Renders the command as its wire text.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use luxws::Command;
    ///
    /// assert_eq!(Command::Login { password: "" }.encode(), "LOGIN;");
    /// assert_eq!(Command::Get { id: "0x1234" }.encode(), "GET;0x1234");
    /// ```
    pub fn encode(&self) -> String {
        match self {
            Command::Login { password } => format!("LOGIN;{password}"),
            Command::Get { id } => format!("GET;{id}"),
        }
    }

    /// The kind of reply that answers this command.
    pub fn kind(&self) -> Kind {
        match self {
            Command::Login { .. } => Kind::Navigation,
            Command::Get { .. } => Kind::Content,
        }
    }

    /// Verb only, for log output.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Login { .. } => "LOGIN",
            Command::Get { .. } => "GET",
        }
    }
}

// Never print the password, not even in debug output.
impl fmt::Debug for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Login { .. } => f.debug_struct("Login").finish_non_exhaustive(),
            Command::Get { id } => f.debug_struct("Get").field("id", id).finish(),
        }
    }
}
