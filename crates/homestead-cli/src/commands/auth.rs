use anyhow::{Context as _, Result};
use cliclack::{input, intro, outro, spinner};
use console::style;

use super::Context;
use crate::session;

pub async fn login(ctx: &Context, email: Option<String>) -> Result<()> {
    let auth = ctx.auth()?;
    intro(style(" homestead login ").on_cyan().black())?;

    let email = match email {
        Some(email) => email,
        None => input("Email address")
            .placeholder("you@example.com")
            .validate(|value: &String| {
                if value.contains('@') {
                    Ok(())
                } else {
                    Err("Enter an email address")
                }
            })
            .interact()?,
    };

    let busy = spinner();
    busy.start("Sending a sign-in code");
    let sent = auth.send_code(&email).await;
    busy.stop("");
    sent.context("Could not send the sign-in code")?;

    let code: String = input(format!("Code sent to {}", email))
        .placeholder("123456")
        .interact()?;
    let actor = auth
        .verify_code(&email, &code)
        .await
        .context("Sign in failed")?;
    session::save(&actor)?;

    outro(format!("Signed in as {}", email))?;
    Ok(())
}

pub fn logout() -> Result<()> {
    if session::clear()? {
        println!("Signed out");
    } else {
        println!("Not signed in");
    }
    Ok(())
}
