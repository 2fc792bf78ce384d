//! Avis "shaders non résolus" envoyé à l'interface utilisateur
//!
//! L'envoi n'attend jamais de réponse. Un seul avis peut être en attente à
//! la fois: tant que le précédent n'a pas été traité, les suivants sont
//! ignorés.

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Contenu de l'avis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedShaderNotice {
    pub missing_shader_names: Vec<String>,
}

/// Côté émetteur, détenu par le coordinateur
#[derive(Debug, Clone)]
pub struct NoticeDispatcher {
    sender: Sender<UnresolvedShaderNotice>,
    in_flight: Arc<AtomicBool>,
}

/// Côté interface
#[derive(Debug)]
pub struct NoticeReceiver {
    receiver: Receiver<UnresolvedShaderNotice>,
    in_flight: Arc<AtomicBool>,
}

/// Avis reçu; le libérer autorise l'avis suivant
#[derive(Debug)]
pub struct PendingNotice {
    notice: UnresolvedShaderNotice,
    in_flight: Arc<AtomicBool>,
}

pub fn notice_channel() -> (NoticeDispatcher, NoticeReceiver) {
    let (sender, receiver) = channel::bounded(1);
    let in_flight = Arc::new(AtomicBool::new(false));

    (
        NoticeDispatcher {
            sender,
            in_flight: in_flight.clone(),
        },
        NoticeReceiver { receiver, in_flight },
    )
}

impl NoticeDispatcher {
    /// Envoie l'avis sans bloquer; retourne faux s'il a été ignoré
    pub fn dispatch(&self, missing_shader_names: Vec<String>) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Avis déjà affiché, nouvel avis ignoré");
            return false;
        }

        match self.sender.try_send(UnresolvedShaderNotice { missing_shader_names }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                debug!("Aucun destinataire pour l'avis de shaders non résolus");
                self.in_flight.store(false, Ordering::Release);
                false
            }
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

impl NoticeReceiver {
    pub fn try_recv(&self) -> Option<PendingNotice> {
        self.receiver.try_recv().ok().map(|notice| self.pending(notice))
    }

    /// Attend le prochain avis; `None` quand le coordinateur a disparu
    pub fn recv(&self) -> Option<PendingNotice> {
        self.receiver.recv().ok().map(|notice| self.pending(notice))
    }

    fn pending(&self, notice: UnresolvedShaderNotice) -> PendingNotice {
        PendingNotice {
            notice,
            in_flight: self.in_flight.clone(),
        }
    }
}

impl PendingNotice {
    pub fn notice(&self) -> &UnresolvedShaderNotice {
        &self.notice
    }

    /// Marque l'avis comme traité
    pub fn complete(self) {}
}

impl Drop for PendingNotice {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_notice_in_flight() {
        let (dispatcher, receiver) = notice_channel();

        assert!(dispatcher.dispatch(vec!["Bar".to_string()]));
        assert!(!dispatcher.dispatch(vec!["Baz".to_string()]));

        let pending = receiver.try_recv().unwrap();
        assert_eq!(pending.notice().missing_shader_names, vec!["Bar"]);

        // Toujours en attente tant que l'interface n'a pas fini
        assert!(!dispatcher.dispatch(vec!["Baz".to_string()]));
        pending.complete();

        assert!(dispatcher.dispatch(vec!["Baz".to_string()]));
        assert_eq!(receiver.try_recv().unwrap().notice().missing_shader_names, vec!["Baz"]);
    }

    #[test]
    fn test_dispatch_without_receiver() {
        let (dispatcher, receiver) = notice_channel();
        drop(receiver);

        assert!(!dispatcher.dispatch(vec!["Bar".to_string()]));
        assert!(!dispatcher.is_in_flight());
    }
}
