//! Sign-in, refresh and sign-out commands

use std::time::Duration;

use anyhow::{bail, Context, Result};
use shopdesk_common::auth::{CallbackParams, SessionState};
use shopdesk_infra::CallbackServer;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::context::AppContext;

/// Start the flow; with `listen`, also wait for the redirect and finish it
pub async fn login(ctx: &AppContext, listen: bool, timeout: Duration) -> Result<()> {
    // Bind before printing the URL so a fast redirect cannot miss the server.
    let server = if listen {
        Some(
            CallbackServer::bind(&ctx.config.auth.redirect_uri)
                .await
                .context("failed to start the callback listener")?,
        )
    } else {
        None
    };

    let request = ctx.session.start_authorization_flow().context("failed to start sign-in")?;
    println!("Open this URL in your browser to sign in:\n\n  {}\n", request.url);

    let Some(mut server) = server else {
        println!("Then run `shopdesk callback <REDIRECT_URL>` with the address you were sent to.");
        return Ok(());
    };

    println!("Waiting up to {}s for the redirect to {} ...", timeout.as_secs(), server.redirect_uri());
    let cancel = cancel_on_ctrl_c();
    let params = tokio::select! {
        biased;
        () = cancel.cancelled() => bail!("sign-in cancelled"),
        params = server.wait_for_callback(timeout) => params.context("no authorization redirect received")?,
    };
    if let Err(e) = server.shutdown().await {
        warn!(error = %e, "callback listener did not shut down cleanly");
    }

    finish(ctx, &params, &cancel).await
}

/// Finish the flow from a redirect URL pasted by the user
pub async fn callback(ctx: &AppContext, redirect_url: &str) -> Result<()> {
    let params = CallbackParams::from_redirect_url(redirect_url)
        .with_context(|| format!("'{redirect_url}' is not an absolute URL"))?;
    finish(ctx, &params, &cancel_on_ctrl_c()).await
}

async fn finish(ctx: &AppContext, params: &CallbackParams, cancel: &CancellationToken) -> Result<()> {
    let user = ctx
        .session
        .handle_authorization_callback_with_cancel(params, cancel)
        .await
        .context("sign-in failed")?;
    println!("Signed in as {} ({})", user.username, user.role);
    Ok(())
}

/// Print the session state and, when signed in, the user
pub fn status(ctx: &AppContext, json: bool) -> Result<()> {
    let snapshot = ctx.session.snapshot();
    if json {
        let value = serde_json::json!({
            "state": snapshot.state.as_str(),
            "user": snapshot.user,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match (&snapshot.state, &snapshot.user) {
        (SessionState::Authenticated, Some(user)) => {
            println!("{}: {} ({})", snapshot.state, user.username, user.role);
        }
        (state, _) => println!("{state}"),
    }
    Ok(())
}

/// Print the signed-in user's profile
pub fn whoami(ctx: &AppContext) -> Result<()> {
    let Some(user) = ctx.session.current_user() else {
        bail!("not signed in; run `shopdesk login`");
    };
    println!("{}", serde_json::to_string_pretty(&user)?);
    Ok(())
}

pub async fn refresh(ctx: &AppContext) -> Result<()> {
    let user = ctx
        .session
        .refresh_access_token_with_cancel(&cancel_on_ctrl_c())
        .await
        .context("refresh failed")?;
    println!("Session refreshed for {}", user.username);
    Ok(())
}

pub fn logout(ctx: &AppContext) {
    let was_signed_in = ctx.session.is_authenticated();
    ctx.session.logout();
    if was_signed_in {
        println!("Signed out");
    } else {
        println!("No active session; local session data cleared");
    }
}

/// Token that fires on the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, cancelling");
                trigger.cancel();
            }
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
        }
    });
    token
}
