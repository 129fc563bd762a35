//! Helpers shared by the boosting loops

/// Tracks validation loss and signals when to stop.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    rounds: usize,
    best_loss: f64,
    best_iteration: usize,
}

impl EarlyStopping {
    pub fn new(rounds: usize) -> Self {
        Self {
            rounds,
            best_loss: f64::INFINITY,
            best_iteration: 0,
        }
    }

    /// Record the loss after `iteration` (1-based); returns `true` to stop.
    pub fn update(&mut self, iteration: usize, loss: f64) -> bool {
        if loss < self.best_loss {
            self.best_loss = loss;
            self.best_iteration = iteration;
        }
        self.rounds > 0 && iteration - self.best_iteration >= self.rounds
    }

    /// 1-based iteration with the lowest loss seen so far
    pub fn best_iteration(&self) -> usize {
        self.best_iteration
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }
}
