mod documents_test;
mod relational_test;
mod support;
