pub mod fixtures;

#[cfg(test)]
mod admission_tests;
#[cfg(test)]
mod drain_tests;
#[cfg(test)]
mod minutes_tests;
#[cfg(test)]
mod moderation_tests;
#[cfg(test)]
mod operator_tests;
#[cfg(test)]
mod room_invariant_tests;
#[cfg(test)]
mod ws_tests;
