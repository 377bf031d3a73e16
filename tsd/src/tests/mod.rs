// Parser tests
mod basic_parsing;
mod expression_parsing;



// Program state tests
mod program_state;
