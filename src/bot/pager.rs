// Button-driven pagination of embeds, backed by `Paginator`.

use std::time::Duration;

use poise::serenity_prelude::{
    self as serenity, ButtonStyle, ComponentInteractionCollector, CreateActionRow, CreateButton,
    CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
};
use poise::CreateReply;

use super::{Context, Error};
use crate::paginate::Paginator;

/// Buttons stop responding after this long without a press.
const PAGINATION_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    First,
    Previous,
    Next,
    Last,
}

impl Nav {
    const ALL: [Nav; 4] = [Nav::First, Nav::Previous, Nav::Next, Nav::Last];

    fn suffix(self) -> &'static str {
        match self {
            Nav::First => "first",
            Nav::Previous => "prev",
            Nav::Next => "next",
            Nav::Last => "last",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Nav::First => "⏮ First",
            Nav::Previous => "◀ Prev",
            Nav::Next => "Next ▶",
            Nav::Last => "Last ⏭",
        }
    }

    /// Parse a button id of the form `{prefix}{suffix}`.
    pub fn from_custom_id(custom_id: &str, prefix: &str) -> Option<Nav> {
        let suffix = custom_id.strip_prefix(prefix)?;
        Nav::ALL.into_iter().find(|nav| nav.suffix() == suffix)
    }

    pub fn apply<T>(self, pager: &mut Paginator<T>) {
        match self {
            Nav::First => pager.first(),
            Nav::Previous => pager.previous(),
            Nav::Next => pager.next(),
            Nav::Last => pager.last(),
        };
    }
}

fn nav_row<T>(prefix: &str, pager: &Paginator<T>) -> CreateActionRow {
    let buttons = Nav::ALL
        .into_iter()
        .map(|nav| {
            let disabled = match nav {
                Nav::First | Nav::Previous => !pager.has_previous(),
                Nav::Next | Nav::Last => !pager.has_next(),
            };
            CreateButton::new(format!("{prefix}{}", nav.suffix()))
                .label(nav.label())
                .style(ButtonStyle::Secondary)
                .disabled(disabled)
        })
        .collect();
    CreateActionRow::Buttons(buttons)
}

/// Send the first page and follow button presses until the collector times out.
pub async fn paginate<T, F>(ctx: Context<'_>, mut pager: Paginator<T>, render: F) -> Result<(), Error>
where
    T: Send + Sync,
    F: Fn(&Paginator<T>) -> CreateEmbed + Send + Sync,
{
    if pager.total_pages() <= 1 {
        ctx.send(CreateReply::default().embed(render(&pager))).await?;
        return Ok(());
    }

    // Button ids are unique per invocation so concurrent paginations don't collide.
    let prefix = format!("{}:", ctx.id());
    let handle = ctx
        .send(
            CreateReply::default()
                .embed(render(&pager))
                .components(vec![nav_row(&prefix, &pager)]),
        )
        .await?;

    let author = ctx.author().id;
    while let Some(press) = ComponentInteractionCollector::new(ctx.serenity_context())
        .filter({
            let prefix = prefix.clone();
            move |press: &serenity::ComponentInteraction| press.data.custom_id.starts_with(&prefix)
        })
        .timeout(PAGINATION_TIMEOUT)
        .await
    {
        if press.user.id != author {
            let _ = press
                .create_response(
                    ctx.serenity_context(),
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("Run the command yourself to browse these results.")
                            .ephemeral(true),
                    ),
                )
                .await;
            continue;
        }
        let Some(nav) = Nav::from_custom_id(&press.data.custom_id, &prefix) else {
            continue;
        };
        nav.apply(&mut pager);

        press
            .create_response(
                ctx.serenity_context(),
                CreateInteractionResponse::UpdateMessage(
                    CreateInteractionResponseMessage::new()
                        .embed(render(&pager))
                        .components(vec![nav_row(&prefix, &pager)]),
                ),
            )
            .await?;
    }

    // Drop the buttons once nobody can use them.
    handle
        .edit(
            ctx,
            CreateReply::default()
                .embed(render(&pager))
                .components(Vec::new()),
        )
        .await?;
    Ok(())
}
