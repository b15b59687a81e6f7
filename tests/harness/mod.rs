mod benchmark_case;
mod read_check_case;
mod stress_case;
