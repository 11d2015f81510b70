//! The interactive menu loop.

mod console;
mod menu;

use std::io;

use anyhow::{Context, Result};
use serde_json::json;
use thiserror::Error;

use crate::db::{StoreError, UserStore};
use crate::timing::timed;
use crate::ui::Level;

pub use console::{Console, TerminalConsole};
use menu::{InputError, MenuChoice, parse_user_id};

/// Why a single menu action did not complete.
#[derive(Error, Debug)]
enum ActionError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("reading input: {0}")]
    Io(#[from] io::Error),

    #[error("input closed")]
    EndOfInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// One interactive run over a single database connection.
pub struct Session<C: Console> {
    store: Box<dyn UserStore>,
    console: C,
}

impl<C: Console> Session<C> {
    pub fn new(store: Box<dyn UserStore>, console: C) -> Self {
        Self { store, console }
    }

    /// Show the menu and dispatch choices until the user exits or input ends.
    ///
    /// Bad input and failed statements are reported and the loop goes on.
    /// Only a lost connection or a broken console ends the session early.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.show_menu();

            let Some(input) = self
                .console
                .read_line("Enter action number")
                .context("reading menu choice")?
            else {
                break;
            };

            let flow = match MenuChoice::parse(&input) {
                Some(choice) => self.dispatch(choice)?,
                None => {
                    self.console.emit(
                        Level::Warn,
                        "menu.invalid",
                        "Invalid choice, please try again.",
                        None,
                    );
                    Flow::Continue
                }
            };

            if flow == Flow::Exit {
                break;
            }
        }

        self.console.emit(Level::Info, "session.exit", "Exiting.", None);
        Ok(())
    }

    /// Close the connection held by this session.
    pub fn close(self) -> Result<(), StoreError> {
        self.store.close()
    }

    fn show_menu(&mut self) {
        let entries: Vec<String> = MenuChoice::ALL
            .iter()
            .map(|choice| format!("{}. {}", choice.number(), choice.label()))
            .collect();
        self.console.menu("Choose an action:", &entries);
    }

    fn dispatch(&mut self, choice: MenuChoice) -> Result<Flow> {
        let outcome = match choice {
            MenuChoice::Create => self.create(),
            MenuChoice::Read => self.read(),
            MenuChoice::Update => self.update(),
            MenuChoice::Delete => self.delete(),
            MenuChoice::Exit => return Ok(Flow::Exit),
        };

        match outcome {
            Ok(()) => Ok(Flow::Continue),
            Err(ActionError::EndOfInput) => Ok(Flow::Exit),
            Err(ActionError::Input(err)) => {
                self.console.emit(Level::Warn, "input.invalid", &err.to_string(), None);
                Ok(Flow::Continue)
            }
            Err(ActionError::Store(err)) if err.is_fatal() || self.store.is_closed() => {
                Err(err).context("database connection lost")
            }
            Err(ActionError::Store(err)) => {
                self.console.emit(
                    Level::Error,
                    "users.failed",
                    &format!("{} failed: {}", choice.label(), err),
                    None,
                );
                Ok(Flow::Continue)
            }
            Err(ActionError::Io(err)) => Err(err).context("reading input"),
        }
    }

    fn ask(&mut self, label: &str) -> Result<String, ActionError> {
        self.console.read_line(label)?.ok_or(ActionError::EndOfInput)
    }

    fn ask_id(&mut self) -> Result<i64, ActionError> {
        let raw = self.ask("Enter user ID")?;
        Ok(parse_user_id(&raw)?)
    }

    fn create(&mut self) -> Result<(), ActionError> {
        let name = self.ask("Enter name")?;
        let email = self.ask("Enter email")?;

        let id = timed("create_user", || self.store.create_user(&name, &email))?;

        self.console.emit(
            Level::Success,
            "users.created",
            &format!("User created with ID: {}", id),
            Some(json!({ "id": id })),
        );
        Ok(())
    }

    fn read(&mut self) -> Result<(), ActionError> {
        let id = self.ask_id()?;

        match timed("read_user", || self.store.read_user(id))? {
            Some(user) => self.console.emit(
                Level::Info,
                "users.found",
                &format!("User: {}", user),
                serde_json::to_value(&user).ok(),
            ),
            None => self.console.emit(
                Level::Info,
                "users.not_found",
                &format!("No user found with ID {}.", id),
                Some(json!({ "id": id })),
            ),
        }
        Ok(())
    }

    fn update(&mut self) -> Result<(), ActionError> {
        let id = self.ask_id()?;
        let name = self.ask("Enter new name")?;
        let email = self.ask("Enter new email")?;

        let affected = timed("update_user", || self.store.update_user(id, &name, &email))?;

        if affected.matched() {
            self.console.emit(
                Level::Success,
                "users.updated",
                &format!("User {} updated.", id),
                Some(json!({ "id": id, "rows": affected.rows })),
            );
        } else {
            self.console.emit(
                Level::Warn,
                "users.update.no_match",
                &format!("No user with ID {}; nothing updated.", id),
                Some(json!({ "id": id, "rows": 0 })),
            );
        }
        Ok(())
    }

    fn delete(&mut self) -> Result<(), ActionError> {
        let id = self.ask_id()?;

        let affected = timed("delete_user", || self.store.delete_user(id))?;

        if affected.matched() {
            self.console.emit(
                Level::Success,
                "users.deleted",
                &format!("User {} deleted.", id),
                Some(json!({ "id": id, "rows": affected.rows })),
            );
        } else {
            self.console.emit(
                Level::Warn,
                "users.delete.no_match",
                &format!("No user with ID {}; nothing deleted.", id),
                Some(json!({ "id": id, "rows": 0 })),
            );
        }
        Ok(())
    }
}
