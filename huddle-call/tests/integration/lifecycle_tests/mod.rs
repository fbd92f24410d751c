mod test_join_and_leave_errors;
mod test_late_joiner_sees_mute;
mod test_leave_mid_restart;
mod test_leave_releases_resources;
mod test_permission_denied_join;
mod test_screen_share;
mod test_toggles;
