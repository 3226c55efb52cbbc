use crate::config_struct;

config_struct! {
    /// Experience store and learner configuration
    pub struct LearnerConfig {
        /// Ring-buffer capacity; oldest records evicted first
        experience_capacity: usize = 1000,

        /// Train / nudge weights every K completed cycles
        train_every_cycles: u64 = 10,

        /// Minimum records before the model trains
        min_records_for_training: usize = 50,

        /// Weight-nudge learning rate
        learning_rate: f64 = 0.05,

        /// Persist the experience buffer to disk on shutdown
        persist_experience: bool = true,
    }
}
