use thiserror::Error;

/// Entries of the main menu, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Create,
    Read,
    Update,
    Delete,
    Exit,
}

impl MenuChoice {
    pub const ALL: [MenuChoice; 5] = [
        MenuChoice::Create,
        MenuChoice::Read,
        MenuChoice::Update,
        MenuChoice::Delete,
        MenuChoice::Exit,
    ];

    pub fn number(self) -> u8 {
        match self {
            MenuChoice::Create => 1,
            MenuChoice::Read => 2,
            MenuChoice::Update => 3,
            MenuChoice::Delete => 4,
            MenuChoice::Exit => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MenuChoice::Create => "Create user",
            MenuChoice::Read => "Read user",
            MenuChoice::Update => "Update user",
            MenuChoice::Delete => "Delete user",
            MenuChoice::Exit => "Exit",
        }
    }

    /// Parse what the user typed at the menu prompt.
    pub fn parse(input: &str) -> Option<MenuChoice> {
        let input = input.trim();
        Self::ALL
            .into_iter()
            .find(|choice| input == choice.number().to_string())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("Invalid user ID '{0}': expected an integer")]
    InvalidUserId(String),
}

pub fn parse_user_id(input: &str) -> Result<i64, InputError> {
    let trimmed = input.trim();
    trimmed
        .parse::<i64>()
        .map_err(|_| InputError::InvalidUserId(trimmed.to_string()))
}
