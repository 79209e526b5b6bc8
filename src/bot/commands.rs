// Slash commands. Each one acknowledges first, computes its result under the
// configured timeout, then renders it.

use std::future::Future;

use poise::CreateReply;
use tracing::{error, info, warn};

use super::{embeds, pager, Context, Error};
use crate::audit::AuditKind;
use crate::error::BotError;
use crate::metrics;
use crate::paginate::Paginator;
use crate::raid::{AllianceRef, RequesterArgs};
use crate::refresh;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum AuditChoice {
    #[name = "military"]
    Military,
    #[name = "spies"]
    Spies,
    #[name = "deposit"]
    Deposit,
    #[name = "activity"]
    Activity,
}

impl From<AuditChoice> for AuditKind {
    fn from(choice: AuditChoice) -> Self {
        match choice {
            AuditChoice::Military => AuditKind::Military,
            AuditChoice::Spies => AuditKind::Spies,
            AuditChoice::Deposit => AuditKind::Deposit,
            AuditChoice::Activity => AuditKind::Activity,
        }
    }
}

/// Run `work` under the command timeout and record the outcome.
async fn compute<T>(
    ctx: Context<'_>,
    command: &str,
    work: impl Future<Output = Result<T, BotError>>,
) -> Result<T, BotError> {
    let result = match tokio::time::timeout(ctx.data().config.command_timeout, work).await {
        Ok(result) => result,
        Err(_) => Err(BotError::Timeout),
    };
    let label = match &result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::COMMANDS_TOTAL.with_label_values(&[command, label]).inc();
    result
}

/// Report a failed command to the caller without leaking details.
async fn reply_error(ctx: Context<'_>, command: &str, err: BotError) -> Result<(), Error> {
    if err.is_retryable() {
        warn!("/{command} failed ({}): {err}", err.kind());
    } else {
        error!("/{command} failed ({}): {err}", err.kind());
    }
    ctx.send(
        CreateReply::default()
            .content(err.user_message())
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

fn parse_exclude(raw: Option<&str>) -> Vec<AllianceRef> {
    raw.map(|s| s.split(',').filter_map(AllianceRef::parse).collect())
        .unwrap_or_default()
}

/// Find raid targets in war range, ranked by estimated loot.
#[poise::command(slash_command)]
pub async fn raid(
    ctx: Context<'_>,
    #[description = "Score to search around (defaults to your nation's score)"] score: Option<f64>,
    #[description = "Search around this nation's score instead"] nation_id: Option<i64>,
    #[description = "Alliance ids or names to skip, comma separated"] exclude: Option<String>,
) -> Result<(), Error> {
    ctx.defer().await?;
    let data = ctx.data();
    let caller = ctx.author().id.get();
    let exclude = parse_exclude(exclude.as_deref());

    let result = compute(ctx, "raid", async {
        let args = RequesterArgs { score, nation_id };
        let requester_score = data
            .raids
            .resolve_score(args, caller, data.api.as_ref(), data.db.as_ref())
            .await?;
        data.raids.search(requester_score, &exclude)
    })
    .await;

    let mut report = match result {
        Ok(report) => report,
        Err(e) => return reply_error(ctx, "raid", e).await,
    };
    info!(
        "/raid by {caller}: {} targets around {:.2}",
        report.candidates.len(),
        report.requester_score
    );

    let candidates = std::mem::take(&mut report.candidates);
    let pages = Paginator::new(candidates, data.config.raid_page_size);
    pager::paginate(ctx, pages, move |p| embeds::raid_page(&report, p)).await
}

/// Link your Discord account to your nation.
#[poise::command(slash_command)]
pub async fn register(
    ctx: Context<'_>,
    #[description = "Your nation id"] nation_id: i64,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let data = ctx.data();
    let author = ctx.author();

    let result = compute(ctx, "register", async {
        let nation = data
            .api
            .nation(nation_id)
            .await?
            .ok_or(BotError::EntityNotFound {
                kind: "nation",
                id: nation_id,
            })?;
        data.db
            .register(author.id.get(), &author.name, nation.id)
            .await?;
        Ok(nation)
    })
    .await;

    match result {
        Ok(nation) => {
            info!("Registered {} to nation {}", author.id, nation.id);
            ctx.send(
                CreateReply::default()
                    .content(format!(
                        "Linked you to **{}** ({}).",
                        nation.nation_name,
                        embeds::nation_url(nation.id)
                    ))
                    .ephemeral(true),
            )
            .await?;
            Ok(())
        }
        Err(e) => reply_error(ctx, "register", e).await,
    }
}

/// Remove the link between your Discord account and your nation.
#[poise::command(slash_command)]
pub async fn unregister(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let caller = ctx.author().id.get();

    let result = compute(ctx, "unregister", async {
        Ok(data.db.unregister(caller).await?)
    })
    .await;

    let message = match result {
        Ok(true) => "Your nation link has been removed.",
        Ok(false) => "You had no registered nation.",
        Err(e) => return reply_error(ctx, "unregister", e).await,
    };
    ctx.send(CreateReply::default().content(message).ephemeral(true))
        .await?;
    Ok(())
}

/// Look up a nation (defaults to yours).
#[poise::command(slash_command)]
pub async fn nation(
    ctx: Context<'_>,
    #[description = "Nation id"] id: Option<i64>,
) -> Result<(), Error> {
    ctx.defer().await?;
    let data = ctx.data();
    let caller = ctx.author().id.get();

    let result = compute(ctx, "nation", async {
        let id = match id {
            Some(id) => id,
            None => data.db.nation_for(caller).await?.ok_or(BotError::NotRegistered)?,
        };
        data.api
            .nation(id)
            .await?
            .ok_or(BotError::EntityNotFound { kind: "nation", id })
    })
    .await;

    match result {
        Ok(nation) => {
            ctx.send(CreateReply::default().embed(embeds::nation_embed(&nation)))
                .await?;
            Ok(())
        }
        Err(e) => reply_error(ctx, "nation", e).await,
    }
}

/// Look up an alliance.
#[poise::command(slash_command)]
pub async fn alliance(
    ctx: Context<'_>,
    #[description = "Alliance id (defaults to the home alliance)"] id: Option<i64>,
) -> Result<(), Error> {
    ctx.defer().await?;
    let data = ctx.data();
    let id = id.unwrap_or(data.config.alliance_id);

    let result = compute(ctx, "alliance", async {
        data.api
            .alliance(id)
            .await?
            .ok_or(BotError::EntityNotFound { kind: "alliance", id })
    })
    .await;

    match result {
        Ok(alliance) => {
            ctx.send(CreateReply::default().embed(embeds::alliance_embed(&alliance)))
                .await?;
            Ok(())
        }
        Err(e) => reply_error(ctx, "alliance", e).await,
    }
}

/// Look up a war.
#[poise::command(slash_command)]
pub async fn war(ctx: Context<'_>, #[description = "War id"] id: i64) -> Result<(), Error> {
    ctx.defer().await?;
    let data = ctx.data();

    let result = compute(ctx, "war", async {
        data.api
            .war(id)
            .await?
            .ok_or(BotError::EntityNotFound { kind: "war", id })
    })
    .await;

    match result {
        Ok(war) => {
            ctx.send(CreateReply::default().embed(embeds::war_embed(&war)))
                .await?;
            Ok(())
        }
        Err(e) => reply_error(ctx, "war", e).await,
    }
}

/// Audit home alliance members.
#[poise::command(slash_command, guild_only)]
pub async fn audit(
    ctx: Context<'_>,
    #[description = "What to audit"] kind: AuditChoice,
) -> Result<(), Error> {
    ctx.defer().await?;
    let data = ctx.data();
    let kind = AuditKind::from(kind);

    let result = compute(ctx, "audit", data.audits.audit(kind)).await;
    let mut report = match result {
        Ok(report) => report,
        Err(e) => return reply_error(ctx, "audit", e).await,
    };

    let findings = std::mem::take(&mut report.findings);
    let pages = Paginator::new(findings, data.config.audit_page_size);
    pager::paginate(ctx, pages, move |p| embeds::audit_page(&report, p)).await
}

/// Show the raid cache status.
#[poise::command(slash_command)]
pub async fn cache(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let status = data.store.status();
    metrics::COMMANDS_TOTAL.with_label_values(&["cache", "ok"]).inc();
    ctx.send(
        CreateReply::default().embed(embeds::cache_embed(status.as_ref(), data.refresher.is_running())),
    )
    .await?;
    Ok(())
}

async fn is_admin(ctx: Context<'_>) -> Result<bool, Error> {
    let allowed = ctx.data().config.admin_user_id == Some(ctx.author().id.get());
    if !allowed {
        ctx.send(
            CreateReply::default()
                .content("Only the bot admin can force a refresh.")
                .ephemeral(true),
        )
        .await?;
    }
    Ok(allowed)
}

/// Force a raid cache refresh (admin only).
#[poise::command(slash_command, check = "is_admin")]
pub async fn refresh(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let message = if data.refresher.is_running() {
        "A refresh is already running; results will appear when it finishes."
    } else {
        refresh::spawn_refresh(data.refresher.clone());
        "Refresh started in the background. Check /cache for progress."
    };
    info!("Forced refresh requested by {}", ctx.author().id);
    metrics::COMMANDS_TOTAL.with_label_values(&["refresh", "ok"]).inc();
    ctx.send(CreateReply::default().content(message).ephemeral(true))
        .await?;
    Ok(())
}
