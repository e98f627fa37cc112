use serenity::model::id::UserId;
use std::{collections::VecDeque, fmt};
use tracing::{debug, info};

use crate::audio::error::PlaybackError;

/// Una canción resuelta, lista para reproducirse.
///
/// Solo guarda la referencia al stream y el título: cada reproducción
/// construye un handle nuevo a partir de `stream_ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub stream_ref: String,
    pub title: String,
    pub requested_by: UserId,
}

impl QueueItem {
    pub fn new(stream_ref: impl Into<String>, title: impl Into<String>, requested_by: UserId) -> Self {
        Self {
            stream_ref: stream_ref.into(),
            title: title.into(),
            requested_by,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl LoopMode {
    /// Off -> Track -> Queue -> Off
    pub fn next(self) -> Self {
        match self {
            LoopMode::Off => LoopMode::Track,
            LoopMode::Track => LoopMode::Queue,
            LoopMode::Queue => LoopMode::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::Off => "off",
            LoopMode::Track => "track",
            LoopMode::Queue => "queue",
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estado de reproducción de una guild: cola pendiente, canción actual y modo loop.
///
/// No hace I/O; el controlador es el único que la muta.
#[derive(Debug)]
pub struct GuildQueue {
    items: VecDeque<QueueItem>,
    now_playing: Option<QueueItem>,
    loop_mode: LoopMode,
    max_size: usize,
}

impl GuildQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            now_playing: None,
            loop_mode: LoopMode::Off,
            max_size,
        }
    }

    /// Agrega un track al final de la cola
    pub fn enqueue(&mut self, item: QueueItem) -> Result<usize, PlaybackError> {
        if self.items.len() >= self.max_size {
            return Err(PlaybackError::precondition(format!(
                "La cola está llena (máximo {} canciones)",
                self.max_size
            )));
        }

        info!("➕ Agregado a la cola: {}", item.title);
        self.items.push_back(item);
        Ok(self.items.len())
    }

    /// Saca el siguiente track (FIFO)
    pub fn dequeue_next(&mut self) -> Option<QueueItem> {
        let next = self.items.pop_front();
        match &next {
            Some(item) => debug!("➡️ Siguiente en cola: {}", item.title),
            None => debug!("📭 Cola vacía, no hay siguiente track"),
        }
        next
    }

    pub fn set_now_playing(&mut self, item: Option<QueueItem>) {
        self.now_playing = item;
    }

    pub fn take_now_playing(&mut self) -> Option<QueueItem> {
        self.now_playing.take()
    }

    pub fn cycle_loop_mode(&mut self) -> LoopMode {
        self.loop_mode = self.loop_mode.next();
        match self.loop_mode {
            LoopMode::Off => info!("➡️ Repetición desactivada"),
            LoopMode::Track => info!("🔂 Repetir canción activado"),
            LoopMode::Queue => info!("🔁 Repetir cola activado"),
        }
        self.loop_mode
    }

    /// Limpia la cola pendiente (no toca la canción actual)
    pub fn clear(&mut self) {
        self.items.clear();
        info!("🗑️ Cola limpiada");
    }

    pub fn now_playing(&self) -> Option<&QueueItem> {
        self.now_playing.as_ref()
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    /// Obtiene información de la cola
    pub fn get_info(&self) -> QueueInfo {
        QueueInfo {
            current: self.now_playing.clone(),
            items: self.items.iter().cloned().collect(),
            loop_mode: self.loop_mode,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueInfo {
    pub current: Option<QueueItem>,
    pub items: Vec<QueueItem>,
    pub loop_mode: LoopMode,
}

impl QueueInfo {
    /// Obtiene una página específica de la cola
    pub fn get_page(&self, page: usize, items_per_page: usize) -> QueuePage {
        let items_per_page = items_per_page.max(1);
        let total_pages = self.items.len().div_ceil(items_per_page).max(1);
        let safe_page = page.clamp(1, total_pages);
        let start = (safe_page - 1) * items_per_page;
        let end = (start + items_per_page).min(self.items.len());

        QueuePage {
            items: self.items[start..end].to_vec(),
            first_position: start + 1,
            current_page: safe_page,
            total_pages,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<QueueItem>,
    pub first_position: usize,
    pub current_page: usize,
    pub total_pages: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(title: &str) -> QueueItem {
        QueueItem::new(format!("https://cdn.test/{title}"), title, UserId::new(7))
    }

    fn titles(queue: &GuildQueue) -> Vec<String> {
        queue.get_info().items.into_iter().map(|i| i.title).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = GuildQueue::new(10);
        queue.enqueue(item("a")).unwrap();
        queue.enqueue(item("b")).unwrap();
        queue.enqueue(item("c")).unwrap();

        assert_eq!(queue.dequeue_next().map(|i| i.title), Some("a".to_string()));
        assert_eq!(titles(&queue), vec!["b", "c"]);
    }

    #[test]
    fn test_enqueue_reports_position() {
        let mut queue = GuildQueue::new(10);
        assert_eq!(queue.enqueue(item("a")).unwrap(), 1);
        assert_eq!(queue.enqueue(item("b")).unwrap(), 2);
    }

    #[test]
    fn test_enqueue_rejects_when_full() {
        let mut queue = GuildQueue::new(1);
        queue.enqueue(item("a")).unwrap();

        let err = queue.enqueue(item("b")).unwrap_err();
        assert!(matches!(err, PlaybackError::Precondition(_)));
        assert_eq!(titles(&queue), vec!["a"]);
    }

    #[test]
    fn test_loop_mode_cycles_back_to_off() {
        let mut queue = GuildQueue::new(10);
        assert_eq!(queue.loop_mode(), LoopMode::Off);
        assert_eq!(queue.cycle_loop_mode(), LoopMode::Track);
        assert_eq!(queue.cycle_loop_mode(), LoopMode::Queue);
        assert_eq!(queue.cycle_loop_mode(), LoopMode::Off);
    }

    #[test]
    fn test_clear_keeps_now_playing() {
        let mut queue = GuildQueue::new(10);
        queue.set_now_playing(Some(item("current")));
        queue.enqueue(item("a")).unwrap();

        queue.clear();

        assert!(titles(&queue).is_empty());
        assert_eq!(queue.now_playing().map(|i| i.title.as_str()), Some("current"));
    }

    #[test]
    fn test_get_page_bounds() {
        let mut queue = GuildQueue::new(100);
        for n in 0..12 {
            queue.enqueue(item(&format!("t{n}"))).unwrap();
        }
        let info = queue.get_info();

        let page = info.get_page(2, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.first_position, 6);
        assert_eq!(page.items.first().map(|i| i.title.as_str()), Some("t5"));

        let last = info.get_page(99, 5);
        assert_eq!(last.current_page, 3);
        assert_eq!(last.items.len(), 2);
    }

    #[test]
    fn test_get_page_on_empty_queue() {
        let info = GuildQueue::new(10).get_info();
        let page = info.get_page(1, 10);
        assert_eq!(page.total_pages, 1);
        assert!(page.items.is_empty());
    }
}
