//! Integration tests driving the prerelease binary against temp storages

mod helpers;

mod test_cli;
mod test_list;
mod test_locksmith;
mod test_swap;
mod test_wipe;
