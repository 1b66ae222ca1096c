use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

use open_jukebox::{
    audio::{player::AudioPlayer, voice::SongbirdSinkFactory},
    bot::{ChannelNotifier, OpenJukebox, PlayerKey, SongbirdGate},
    config::Config,
    sources::{MediaResolver, ProviderSet, SpotifyClient, YouTubeClient},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Open Jukebox v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    // Proveedores: YouTube nativo, Spotify si hay credenciales
    let mut providers = ProviderSet::new(Arc::new(YouTubeClient::new(
        config.ytdlp_path.clone(),
        config.max_playlist_size,
    )));
    if let Some((client_id, client_secret)) = config.spotify_credentials() {
        info!("🟢 Spotify habilitado");
        providers = providers.with_provider(Arc::new(SpotifyClient::new(
            client_id,
            client_secret,
            config.max_playlist_size,
        )));
    }
    let resolver = MediaResolver::new(
        Arc::new(providers),
        config.max_song_duration(),
        config.max_playlist_size,
    );

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES | GatewayIntents::GUILD_MESSAGES;

    let songbird = Songbird::serenity();
    let client = Client::builder(&config.discord_token, intents)
        .event_handler(OpenJukebox)
        .register_songbird_with(Arc::clone(&songbird))
        .await?;

    let player = AudioPlayer::new(
        &config,
        resolver,
        Arc::new(SongbirdSinkFactory::new(Arc::clone(&songbird), config.default_volume)?),
        Arc::new(ChannelNotifier::new(Arc::clone(&client.http))),
    )
    .with_voice_gate(Arc::new(SongbirdGate::new(
        Arc::clone(&client.cache),
        Arc::clone(&songbird),
    )));

    {
        let mut data = client.data.write().await;
        data.insert::<PlayerKey>(Arc::new(player));
    }

    run(client).await
}

async fn run(mut client: Client) -> Result<()> {
    let shard_manager = Arc::clone(&client.shard_manager);

    // Manejar shutdown graceful
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    // Verificar dependencias críticas
    let yt_dlp = async_process::Command::new(&config.ytdlp_path)
        .arg("--version")
        .output()
        .await?;

    if yt_dlp.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Dependencias faltantes: yt-dlp");
    }
}
