/*
    fluxrecover

    src/format/mod.rs

    Format recognizer registry (C4). Recognizers are tried in a fixed
    rotating order and the one that succeeds is moved to the front of the
    list for next time, rather than re-deriving a ranking from scratch on
    every stream.
*/

pub mod dec_rx;
pub mod dg_nova;
pub mod hp98xx;
pub mod ibm;
pub mod intel_isis;
pub mod ohio_scientific;
pub mod q1_microlite;
pub mod wang;
pub mod zilog_mcz;

use crate::media::Media;
use crate::stream::Stream;
use dyn_clone::DynClone;

/// One sector format a stream can be decoded against.
///
/// `process` attempts to recognize and decode every sector this stream
/// contains under this format, feeding successes to `media` via
/// [`Media::add_reading`], and returns whether anything was read.
pub trait FormatRecognizer: DynClone {
    fn name(&self) -> &'static str;
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }
    fn process(&self, stream: &Stream, media: &mut Media) -> bool;
}

dyn_clone::clone_trait_object!(FormatRecognizer);

/// A rotating work-list of recognizers: `try_all` tries each in turn and,
/// on the first success, moves it to the front so the next stream from the
/// same medium tries it first.
pub struct Registry {
    todo: Vec<Box<dyn FormatRecognizer>>,
}

impl Registry {
    pub fn new(recognizers: Vec<Box<dyn FormatRecognizer>>) -> Self {
        Self { todo: recognizers }
    }

    /// The full catalog of 9 recognizers, in the order `Ibm::default` tries
    /// its own (modulation, clock) worklist: cheapest and most common
    /// formats first.
    pub fn catalog() -> Self {
        Self::new(vec![
            Box::new(ibm::Ibm::default()),
            Box::new(dec_rx::DecRx02::default()),
            Box::new(wang::WangWcs),
            Box::new(dg_nova::DgNova),
            Box::new(zilog_mcz::ZilogMcz),
            Box::new(intel_isis::IntelIsis),
            Box::new(hp98xx::Hp9885),
            Box::new(q1_microlite::Q1MicroLiteFm::new()),
            Box::new(q1_microlite::Q1MicroLiteMfm::new(28)),
            Box::new(q1_microlite::Q1MicroLiteMfm::new(39)),
            Box::new(ohio_scientific::OhioScientificU),
        ])
    }

    pub fn try_all(&mut self, stream: &Stream, media: &mut Media) -> bool {
        let mut any = false;
        for _ in 0..self.todo.len() {
            let recognizer = self.todo.remove(0);
            let hit = recognizer.process(stream, media);
            self.todo.push(recognizer);
            if hit {
                let last = self.todo.pop().unwrap();
                self.todo.insert(0, last);
                any = true;
            }
        }
        any
    }
}
