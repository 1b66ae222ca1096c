use std::time::Duration;

use thiserror::Error;

/// Resultado estándar del núcleo de reproducción
pub type Result<T> = std::result::Result<T, MusicError>;

/// Errores que el núcleo reporta a la capa de comandos.
///
/// Ninguno es fatal para el proceso: todos quedan acotados a la operación de
/// un solo guild. Los mensajes se muestran tal cual al usuario.
#[derive(Debug, Error)]
pub enum MusicError {
    /// Enlace mal formado o sin contenido reconocible
    #[error("Enlace inválido")]
    InvalidLink,

    /// URL bien formada pero de un servicio sin proveedor
    #[error("Proveedor no soportado: {0}")]
    UnsupportedProvider(String),

    /// La búsqueda por texto no devolvió nada
    #[error("No se encontraron resultados para: {0}")]
    NoSearchResults(String),

    #[error("Debes estar en un canal de voz")]
    UserNotInVoiceSession,

    #[error("El bot está en otro canal de voz")]
    WrongSession,

    /// Playlist/álbum resuelto pero sin ninguna entrada reproducible
    #[error("La playlist no tiene canciones reproducibles")]
    EmptyPlaylist,

    #[error("La cola está llena (máximo {0} canciones)")]
    QueueFull(usize),

    #[error("La canción '{title}' supera la duración máxima de {}s", .max.as_secs())]
    TrackTooLong { title: String, max: Duration },

    /// Fallo de transporte o de backend de un proveedor
    #[error("Error del proveedor {provider}: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    #[error("Error de audio: {0}")]
    Sink(String),

    #[error("Error al enviar notificación: {0}")]
    Notification(String),
}

impl MusicError {
    pub fn provider(provider: &'static str, message: impl ToString) -> Self {
        Self::Provider {
            provider,
            message: message.to_string(),
        }
    }

    /// Errores que el usuario puede corregir cambiando su entrada
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidLink
                | Self::UnsupportedProvider(_)
                | Self::NoSearchResults(_)
                | Self::UserNotInVoiceSession
                | Self::WrongSession
                | Self::EmptyPlaylist
                | Self::QueueFull(_)
                | Self::TrackTooLong { .. }
        )
    }
}
