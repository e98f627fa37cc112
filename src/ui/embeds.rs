use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::audio::{
    queue::{LoopMode, QueueInfo, QueueItem, QueuePage},
    reply::{Reply, ReplyKind},
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Tunes";

/// Discord rechaza el embed entero si un field supera este largo
const FIELD_VALUE_LIMIT: usize = 1024;
const TITLE_LIMIT: usize = 80;

/// Convierte el resultado de una operación en un embed
pub fn reply_embed(reply: &Reply) -> CreateEmbed {
    let color = match reply.kind {
        ReplyKind::Info => colors::SUCCESS_GREEN,
        ReplyKind::Error => colors::ERROR_RED,
    };

    CreateEmbed::default()
        .description(&reply.text)
        .color(color)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(track: &QueueItem, loop_mode: LoopMode) -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title))
        .color(colors::SUCCESS_GREEN)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by), true)
        .field("🔁 Repetición", loop_mode_label(loop_mode), true)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(queue_info: &QueueInfo, page: usize, items_per_page: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if queue_info.items.is_empty() && queue_info.current.is_none() {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    if let Some(current) = &queue_info.current {
        let status = match queue_info.loop_mode {
            LoopMode::Track => "🔂",
            LoopMode::Queue => "🔁",
            LoopMode::Off => "▶️",
        };
        embed = embed.field(
            format!("{} Reproduciendo", status),
            format!("**{}**", truncate_title(&current.title, TITLE_LIMIT)),
            false,
        );
    }

    let queue_page = queue_info.get_page(page, items_per_page);
    if !queue_page.items.is_empty() {
        embed = embed.field("Próximas canciones", queue_lines(&queue_page), false);
    }

    embed = embed.field(
        "Información",
        format!(
            "**Total:** {} canciones • **Repetición:** {}",
            queue_info.items.len(),
            loop_mode_label(queue_info.loop_mode)
        ),
        false,
    );

    let footer = if queue_page.total_pages > 1 {
        format!(
            "Página {} de {} • Guild Tunes",
            queue_page.current_page, queue_page.total_pages
        )
    } else {
        STANDARD_FOOTER.to_string()
    };

    embed.footer(CreateEmbedFooter::new(footer)).timestamp(Timestamp::now())
}

fn queue_lines(page: &QueuePage) -> String {
    let mut lines = String::new();
    let mut length = 0;

    for (i, item) in page.items.iter().enumerate() {
        let line = format!(
            "**{}**. {}\n",
            page.first_position + i,
            truncate_title(&item.title, TITLE_LIMIT)
        );
        let line_length = line.chars().count();

        // Reservar un carácter para el "…" final
        if length + line_length > FIELD_VALUE_LIMIT - 1 {
            lines.push('…');
            break;
        }

        length += line_length;
        lines.push_str(&line);
    }

    lines
}

/// Corta títulos largos en `max` caracteres, terminando en "…"
fn truncate_title(title: &str, max: usize) -> String {
    if title.chars().count() <= max {
        return title.to_string();
    }

    let mut short: String = title.chars().take(max.saturating_sub(1)).collect();
    short.push('…');
    short
}

pub fn loop_mode_label(mode: LoopMode) -> &'static str {
    match mode {
        LoopMode::Off => "desactivada",
        LoopMode::Track => "canción",
        LoopMode::Queue => "cola",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::queue::GuildQueue;
    use serenity::model::id::UserId;

    #[test]
    fn test_queue_lines_are_numbered_from_page_start() {
        let mut queue = GuildQueue::new(50);
        for n in 1..=12 {
            queue
                .enqueue(QueueItem::new(format!("https://cdn.test/{n}"), format!("Song {n}"), UserId::new(1)))
                .unwrap();
        }

        let page = queue.get_info().get_page(2, 10);
        assert_eq!(queue_lines(&page), "**11**. Song 11\n**12**. Song 12\n");
    }

    #[test]
    fn test_long_titles_fit_in_one_field() {
        let mut queue = GuildQueue::new(50);
        for n in 1..=25 {
            let title = format!("{n} {}", "Official Music Video (Remastered 4K) ".repeat(6));
            queue
                .enqueue(QueueItem::new(format!("https://cdn.test/{n}"), title, UserId::new(1)))
                .unwrap();
        }

        let page = queue.get_info().get_page(1, 10);
        let lines = queue_lines(&page);
        assert!(lines.chars().count() <= FIELD_VALUE_LIMIT);
        assert_eq!(lines.lines().count(), 10);
        assert!(lines.lines().all(|line| line.ends_with('…')));

        // Una página enorme se corta antes del límite
        let page = queue.get_info().get_page(1, 25);
        let lines = queue_lines(&page);
        assert!(lines.chars().count() <= FIELD_VALUE_LIMIT);
        assert!(lines.ends_with('…'));
    }

    #[test]
    fn test_truncate_title_keeps_short_titles() {
        assert_eq!(truncate_title("Song", 80), "Song");
        assert_eq!(truncate_title("ñandú música", 5), "ñand…");
    }
}
