//! Integration tests driving the draftrail binary

mod helpers;

mod test_init;
mod test_run;
mod test_trigger;
