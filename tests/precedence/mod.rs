mod precedence_case1;
mod precedence_case2_host_tiers;
