use rand::seq::SliceRandom;
use std::collections::VecDeque;
use tracing::debug;

use crate::error::PlayerError;
use crate::player::track::Track;

/// Cantidad mínima de canciones para poder mezclar la cola.
pub const SHUFFLE_MIN: usize = 3;

/// Modo de repetición del reproductor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Off,
    Current,
    Queue,
}

/// Cola de reproducción de una sesión: canciones pendientes (el frente es
/// la próxima en sonar) más un historial acotado de canciones ya tocadas.
///
/// Una canción sacada del frente pasa a ser la "actual" de la sesión y no
/// vuelve a estar en `pending` mientras suena.
#[derive(Debug)]
pub struct TrackQueue {
    pending: VecDeque<Track>,
    history: VecDeque<Track>,
    history_limit: usize,
}

impl TrackQueue {
    pub fn new(history_limit: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            history: VecDeque::new(),
            history_limit,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.pending.iter()
    }

    pub fn history(&self) -> impl Iterator<Item = &Track> {
        self.history.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.pending.get(index)
    }

    /// Agrega una canción al final de la cola.
    pub fn push_back(&mut self, track: Track) {
        self.pending.push_back(track);
    }

    /// Agrega una canción al frente de la cola (próxima en sonar).
    pub fn push_front(&mut self, track: Track) {
        self.pending.push_front(track);
    }

    /// Inserta en una posición interna (base 0); se ajusta al final si
    /// la posición excede el tamaño actual.
    pub fn insert(&mut self, index: usize, track: Track) {
        let index = index.min(self.pending.len());
        self.pending.insert(index, track);
    }

    /// Saca la próxima canción a reproducir.
    pub fn pop_front(&mut self) -> Option<Track> {
        self.pending.pop_front()
    }

    pub fn pop_back(&mut self) -> Option<Track> {
        self.pending.pop_back()
    }

    /// Elimina la canción en la posición interna (base 0).
    pub fn remove_at(&mut self, index: usize) -> Result<Track, PlayerError> {
        self.pending
            .remove(index)
            .ok_or(PlayerError::IndexOutOfRange {
                index,
                len: self.pending.len(),
            })
    }

    /// Rotación cíclica: la canción en `offset` pasa a ser la próxima.
    /// Un offset negativo rota en sentido contrario, de modo que
    /// `rotate(k)` seguido de `rotate(-k)` deja la cola como estaba.
    pub fn rotate(&mut self, offset: isize) {
        let len = self.pending.len();
        if len < 2 {
            return;
        }

        let k = offset.rem_euclid(len as isize) as usize;
        self.pending.rotate_left(k);
    }

    /// Mezcla la cola con una permutación uniforme.
    pub fn shuffle(&mut self) -> Result<(), PlayerError> {
        if self.pending.len() < SHUFFLE_MIN {
            return Err(PlayerError::QueueTooSmall { min: SHUFFLE_MIN });
        }

        let mut rng = rand::thread_rng();
        self.pending.make_contiguous().shuffle(&mut rng);
        Ok(())
    }

    /// Registra una canción ya tocada; el historial descarta la más
    /// vieja al superar su capacidad.
    pub fn record_played(&mut self, track: Track) {
        self.history.push_back(track);
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }

    /// Saca la canción tocada más recientemente.
    pub fn pop_last_played(&mut self) -> Option<Track> {
        self.history.pop_back()
    }

    /// Readiciona todo el historial a la cola en orden de reproducción
    /// original (la más vieja primero). Devuelve cuántas se movieron.
    pub fn readd_history(&mut self) -> usize {
        let moved = self.history.len();
        self.pending.extend(self.history.drain(..));
        moved
    }

    /// Vacía la cola pendiente. Devuelve cuántas canciones se descartaron.
    pub fn clear(&mut self) -> usize {
        let cleared = self.pending.len();
        self.pending.clear();
        if cleared > 0 {
            debug!("🗑️ Cola limpiada: {} canciones", cleared);
        }
        cleared
    }

    /// Busca la primera canción cuyo título contiene la consulta o cuyo
    /// título contiene todas las palabras de la consulta.
    pub fn find(&self, query: &str) -> Option<usize> {
        let query = query.to_lowercase();
        let words: Vec<&str> = query.split_whitespace().collect();

        self.pending.iter().position(|track| {
            let title = track.title().to_lowercase();
            if title.contains(&query) {
                return true;
            }
            let title_words: Vec<&str> = title.split_whitespace().collect();
            !words.is_empty() && words.iter().all(|w| title_words.contains(w))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserId;
    use crate::player::track::TrackInfo;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> Track {
        Track::from_info(
            TrackInfo {
                identifier: title.to_string(),
                title: title.to_string(),
                author: "autor".to_string(),
                uri: format!("https://example.com/{title}"),
                length_ms: 180_000,
                is_stream: false,
                artwork_url: None,
            },
            UserId(7),
        )
    }

    fn queue_of(titles: &[&str]) -> TrackQueue {
        let mut q = TrackQueue::new(20);
        for t in titles {
            q.push_back(track(t));
        }
        q
    }

    fn titles(q: &TrackQueue) -> Vec<String> {
        q.iter().map(|t| t.title().to_string()).collect()
    }

    #[test]
    fn test_fifo_length_after_enqueues_and_dequeues() {
        let mut q = TrackQueue::new(20);
        for i in 0..10 {
            q.push_back(track(&format!("t{i}")));
        }
        for i in 0..4 {
            assert_eq!(q.pop_front().unwrap().title(), format!("t{i}"));
        }
        assert_eq!(q.len(), 6);
    }

    #[test]
    fn test_rotate_and_inverse_restore_order() {
        for k in [1isize, 2, 4, 7] {
            let mut q = queue_of(&["a", "b", "c", "d", "e"]);
            let before = titles(&q);
            q.rotate(k);
            q.rotate(-k);
            assert_eq!(titles(&q), before, "k={k}");
        }
    }

    #[test]
    fn test_rotate_brings_offset_to_front() {
        let mut q = queue_of(&["a", "b", "c", "d"]);
        q.rotate(2);
        assert_eq!(titles(&q), vec!["c", "d", "a", "b"]);
    }

    #[test]
    fn test_shuffle_too_small_fails() {
        let mut q = queue_of(&["a", "b"]);
        assert_eq!(
            q.shuffle(),
            Err(PlayerError::QueueTooSmall { min: SHUFFLE_MIN })
        );
        assert_eq!(titles(&q), vec!["a", "b"]);
    }

    #[test]
    fn test_shuffle_preserves_multiset() {
        let mut q = queue_of(&["a", "b", "c", "d", "e"]);
        q.shuffle().unwrap();
        let mut shuffled = titles(&q);
        shuffled.sort();
        assert_eq!(shuffled, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_remove_at_out_of_range_reports_len() {
        let mut q = queue_of(&["a", "b"]);
        assert_eq!(
            q.remove_at(5),
            Err(PlayerError::IndexOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(q.remove_at(1).unwrap().title(), "b");
    }

    #[test]
    fn test_insert_clamps_to_tail() {
        let mut q = queue_of(&["a", "b"]);
        q.insert(99, track("c"));
        assert_eq!(titles(&q), vec!["a", "b", "c"]);
        q.insert(1, track("x"));
        assert_eq!(titles(&q), vec!["a", "x", "b", "c"]);
    }

    #[test]
    fn test_history_evicts_oldest_beyond_capacity() {
        let mut q = TrackQueue::new(20);
        for i in 0..25 {
            q.record_played(track(&format!("t{i}")));
        }
        assert_eq!(q.history_len(), 20);
        assert_eq!(q.history().next().unwrap().title(), "t5");
        assert_eq!(q.pop_last_played().unwrap().title(), "t24");
    }

    #[test]
    fn test_readd_history_keeps_play_order() {
        let mut q = TrackQueue::new(20);
        q.record_played(track("primera"));
        q.record_played(track("segunda"));
        q.push_back(track("pendiente"));

        assert_eq!(q.readd_history(), 2);
        assert_eq!(titles(&q), vec!["pendiente", "primera", "segunda"]);
        assert!(q.history_is_empty());
    }

    #[test]
    fn test_find_substring_and_word_subset() {
        let q = queue_of(&["Never Gonna Give You Up", "Take On Me", "Africa"]);
        assert_eq!(q.find("gonna give"), Some(0));
        assert_eq!(q.find("me take"), Some(1));
        assert_eq!(q.find("AFRICA"), Some(2));
        assert_eq!(q.find("bohemian"), None);
    }
}
