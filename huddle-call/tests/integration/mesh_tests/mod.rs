mod test_late_joiner_candidate;
mod test_single_initiator_per_pair;
mod test_three_participants_form_mesh;
