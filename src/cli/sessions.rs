//! Sessions CLI command handlers.

use anyhow::{bail, Result};

use agentry::config::RuntimeSettings;
use agentry::session::SessionManager;

use super::common::create_registry;
use super::SessionsAction;

pub(crate) async fn cmd_sessions(settings: RuntimeSettings, action: SessionsAction) -> Result<()> {
    match action {
        SessionsAction::List { agent } => {
            let registry = create_registry(settings)?;
            let names = match agent {
                Some(name) if !registry.contains(&name) => bail!("Unknown agent: {}", name),
                Some(name) => vec![name],
                None => registry.list_names(),
            };

            let mut total = 0usize;
            for name in names {
                let (store, backend) = registry
                    .runtime()
                    .sessions()
                    .create_session_service(&name);
                let sessions = SessionManager::new(store, name.clone()).list().await?;
                if sessions.is_empty() {
                    continue;
                }
                println!("{} ({:?} store):", name, backend);
                for session in &sessions {
                    println!(
                        "  {:<24} {:<38} turns={:<4} updated={}",
                        session.key.user_id,
                        session.key.session_id,
                        session.turn_count,
                        session.updated_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
                total += sessions.len();
            }

            if total == 0 {
                println!("No sessions found.");
            }
        }
    }
    Ok(())
}
