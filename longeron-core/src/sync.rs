//! Small synchronization helpers.

use parking_lot::{Condvar, Mutex};

/// One-shot terminal flag with cooperative waiting.
///
/// `join()` on clients and servers parks on this until the owning thread
/// signals its exit.
#[derive(Default)]
pub(crate) struct Terminal {
    done: Mutex<bool>,
    cv: Condvar,
}

impl Terminal {
    pub(crate) fn signal(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.cv.notify_all();
    }

    pub(crate) fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.cv.wait(&mut done);
        }
    }
}
