use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{
    audio::queue::{LoopMode, PlayableItem, QueuePage},
    error::MusicError,
    sources::{ProviderKind, ResolvedBatch},
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Open Jukebox";

fn source_label(item: &PlayableItem) -> &'static str {
    match item.provider() {
        ProviderKind::NativeCatalog => "YouTube",
        ProviderKind::CrossCatalog => "Spotify",
    }
}

/// Embed "reproduciendo ahora"
pub fn create_now_playing_embed(item: &PlayableItem) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", item.title()))
        .color(colors::SUCCESS_GREEN)
        .field("🎤 Artista", item.uploader().unwrap_or("Desconocido"), true)
        .field("⏱️ Duración", format_duration(item.duration()), true)
        .field("👤 Solicitado por", format!("<@{}>", item.requested_by()), true)
        .field("🔗 Fuente", source_label(item), true);

    if let Some(album) = item.album() {
        embed = embed.field("💿 Álbum", album, true);
    }

    if let Some(thumbnail) = item.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    if item.locator().starts_with("http") {
        embed = embed.url(item.locator());
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed de lo agregado a la cola
pub fn create_added_embed(batch: &ResolvedBatch) -> CreateEmbed {
    let mut embed = CreateEmbed::default().color(colors::SUCCESS_GREEN);

    embed = match batch.items.as_slice() {
        [item] => embed
            .title("✅ Canción Agregada")
            .description(format!("**{}** se ha agregado a la cola", item.title()))
            .field("⏱️ Duración", format_duration(item.duration()), true),
        items => embed
            .title("✅ Playlist Agregada")
            .description(format!("Se agregaron **{}** canciones a la cola", items.len()))
            .field("⏱️ Duración total", format_duration(batch.total_duration()), true),
    };

    if let Some(thumbnail) = &batch.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed de una página de la cola (la página se muestra en base 1)
pub fn create_queue_embed(page: &QueuePage, now_playing: Option<&PlayableItem>, loop_mode: LoopMode) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if let Some(current) = now_playing {
        let status = match loop_mode {
            LoopMode::Song => "🔂",
            LoopMode::Queue => "🔁",
            LoopMode::Disabled => "▶️",
        };
        embed = embed.field(format!("{} Reproduciendo", status), track_line(current), false);
    }

    if page.total_items == 0 {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    let first_position = page.page * page.page_size;
    let description: String = page
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            format!(
                "**{}**. {} `[{}]`\n",
                first_position + i + 1,
                track_line(item),
                format_duration(item.duration())
            )
        })
        .collect();

    embed
        .field("Próximas canciones", description, false)
        .field(
            "Información",
            format!(
                "**Total:** {} canciones • **Duración:** {}",
                page.total_items,
                format_duration(page.total_duration)
            ),
            false,
        )
        .footer(CreateEmbedFooter::new(format!(
            "Página {} de {} • Open Jukebox",
            page.page + 1,
            page.total_pages
        )))
        .timestamp(Timestamp::now())
}

/// Embed de error; los errores internos no exponen detalles
pub fn create_error_embed(error: &MusicError) -> CreateEmbed {
    let (title, color) = if error.is_user_error() {
        ("⚠️ No se pudo completar", colors::WARNING_ORANGE)
    } else {
        ("❌ Error interno", colors::ERROR_RED)
    };

    let description = if error.is_user_error() {
        error.to_string()
    } else {
        "Ocurrió un error inesperado, intenta de nuevo más tarde".to_string()
    };

    CreateEmbed::default()
        .title(title)
        .description(description)
        .color(color)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn track_line(item: &PlayableItem) -> String {
    match item.uploader() {
        Some(uploader) => format!("**{}** - {}", item.title(), uploader),
        None => format!("**{}**", item.title()),
    }
}

/// Formatea una duración en formato legible
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
