//! # Audio Module
//!
//! Estado de reproducción por guild y la lógica que decide qué suena.
//!
//! ## Architecture
//!
//! ### [`queue`] - Guild Playback State
//! - Cola FIFO, canción actual y modo loop (off / canción / cola)
//! - Sin I/O ni efectos secundarios
//!
//! ### [`player`] - Playback Controller
//! - `/play`: resolver, conectar o moverse, reproducir o encolar
//! - Finalizaciones: loop de canción, loop de cola, siguiente en cola
//! - Timer de inactividad cancelable
//!
//! ### [`session`] / [`voice`] - Audio Session
//! - Contratos `VoiceGateway` / `AudioSession` y su implementación songbird
//! - Un único canal de finalizaciones `(guild, playback_id, outcome)`
//!
//! ## Concurrency
//!
//! [`registry::PlaybackRegistry`] guarda un `tokio::sync::Mutex` por guild.
//! Comandos, finalizaciones y el timer de inactividad de una misma guild se
//! serializan en ese lock; guilds distintas no se bloquean entre sí.

pub mod error;
pub mod player;
pub mod queue;
pub mod registry;
pub mod reply;
pub mod session;
pub mod voice;

#[cfg(test)]
pub mod testing;
