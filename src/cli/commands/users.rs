//! Users command: review and activate accounts.

use crate::auth::UserStore;
use crate::cli::{Output, UsersAction};
use anyhow::Result;
use console::style;

/// Run the users command.
pub fn run_users(action: &UsersAction, users: &UserStore) -> Result<()> {
    match action {
        UsersAction::List => {
            let all = users.list()?;
            if all.is_empty() {
                Output::info("No accounts registered.");
                return Ok(());
            }
            Output::header(&format!("Accounts ({})", all.len()));
            for user in &all {
                let status = if user.is_active {
                    style("active").green()
                } else {
                    style("pending").yellow()
                };
                let role = if user.is_admin { " admin" } else { "" };
                Output::list_item(&format!(
                    "{} [{}{}] registered {}",
                    user.email,
                    status,
                    role,
                    user.created_at.format("%Y-%m-%d")
                ));
            }
        }

        UsersAction::Activate { email } => {
            update(users, email, |_, admin| (true, admin), "activated")?
        }
        UsersAction::Deactivate { email } => {
            update(users, email, |_, admin| (false, admin), "deactivated")?
        }
        UsersAction::Promote { email } => {
            update(users, email, |active, _| (active, true), "promoted to admin")?
        }
    }

    Ok(())
}

fn update(
    users: &UserStore,
    email: &str,
    flags: impl Fn(bool, bool) -> (bool, bool),
    verb: &str,
) -> Result<()> {
    let Some(user) = users.find_by_email(email)? else {
        Output::error(&format!("No account for {}", email));
        anyhow::bail!("unknown account {}", email);
    };
    let (is_active, is_admin) = flags(user.is_active, user.is_admin);
    users.set_flags(&user.email, is_active, is_admin)?;
    Output::success(&format!("{} {}.", user.email, verb));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activate_and_promote() {
        let users = UserStore::in_memory().unwrap();
        users.create("ana@example.com", "hash", false).unwrap();

        run_users(&UsersAction::Activate { email: "ANA@example.com".into() }, &users).unwrap();
        let user = users.find_by_email("ana@example.com").unwrap().unwrap();
        assert!(user.is_active);
        assert!(!user.is_admin);

        run_users(&UsersAction::Promote { email: "ana@example.com".into() }, &users).unwrap();
        run_users(&UsersAction::Deactivate { email: "ana@example.com".into() }, &users).unwrap();
        let user = users.find_by_email("ana@example.com").unwrap().unwrap();
        assert!(!user.is_active);
        assert!(user.is_admin);
    }

    #[test]
    fn test_unknown_account() {
        let users = UserStore::in_memory().unwrap();
        assert!(run_users(&UsersAction::Activate { email: "nobody@example.com".into() }, &users).is_err());
        assert!(run_users(&UsersAction::List, &users).is_ok());
    }
}
