mod push_updates_case1;
