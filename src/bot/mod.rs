// Discord command layer: framework setup and the shared command context.

pub mod commands;
pub mod embeds;
pub mod pager;

use std::sync::Arc;

use poise::serenity_prelude as serenity;
use tracing::{error, info};

use crate::audit::AuditEngine;
use crate::config::Config;
use crate::db::Database;
use crate::raid::RaidSearch;
use crate::refresh::SnapshotRefresher;
use crate::store::SnapshotStore;
use crate::upstream::GameApi;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// State shared by every command invocation.
pub struct Data {
    pub config: Arc<Config>,
    pub store: Arc<SnapshotStore>,
    pub refresher: Arc<SnapshotRefresher>,
    pub raids: RaidSearch,
    pub audits: AuditEngine,
    pub api: Arc<dyn GameApi>,
    pub db: Arc<Database>,
}

async fn on_error(err: poise::FrameworkError<'_, Data, Error>) {
    match err {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Command /{} failed: {error}", ctx.command().name);
            let _ = ctx
                .send(
                    poise::CreateReply::default()
                        .content("Something went wrong on our side. Please try again later.")
                        .ephemeral(true),
                )
                .await;
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {e}");
            }
        }
    }
}

/// Connect to Discord and serve commands until the gateway shuts down.
pub async fn run(data: Data) -> Result<(), Error> {
    let token = data.config.bot_token.clone();
    let intents = serenity::GatewayIntents::non_privileged();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::raid(),
                commands::register(),
                commands::unregister(),
                commands::nation(),
                commands::alliance(),
                commands::war(),
                commands::audit(),
                commands::cache(),
                commands::refresh(),
            ],
            on_error: |err| Box::pin(on_error(err)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Connected to Discord as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    client.start().await?;

    Ok(())
}
