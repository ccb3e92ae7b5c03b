use std::sync::Arc;
use std::time::Duration;

use crate::access::AccessCounter;
use crate::context::Context;

const POLL: Duration = Duration::from_millis(10);

/// Storage key holding the admission slots this request owns.
const ADMISSIONS_KEY: &str = "kite.limit.admissions";

/// Admits at most `n` requests per path past this point at a time.
///
/// Later requests block, polling every 10 ms, until a slot frees up. Only
/// admitted requests hold a slot, so requests still waiting here never
/// count against each other. The slot is released when the request's
/// context is dropped, after the response has been produced.
pub fn limit(n: i64) -> impl Fn(&mut Context) + Send + Sync + 'static {
    let admitted = Arc::new(AccessCounter::new());
    move |ctx: &mut Context| {
        let path = ctx.request().path().to_owned();
        let generation = loop {
            match admitted.try_enter(&path, n) {
                Some(generation) => break generation,
                None => std::thread::sleep(POLL),
            }
        };
        let slot = Admission { counter: Arc::clone(&admitted), path, generation };
        match ctx.storage_mut().get_mut::<Vec<Admission>>(ADMISSIONS_KEY) {
            Some(slots) => slots.push(slot),
            None => ctx.storage_mut().set(ADMISSIONS_KEY, vec![slot]),
        }
    }
}

/// One admitted request; gives its slot back on drop.
struct Admission {
    counter: Arc<AccessCounter>,
    path: String,
    generation: u64,
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.counter.leave(&self.path, self.generation);
    }
}
