use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;

use crate::config::TrainConfig;
use crate::squad::{Span, SquadExample};
use crate::train_model::{Prediction, SpanModel};
use crate::util::{safe_ln, softmax};

/// Answer pointer model.
///
/// The question is summarized as the mean of its token embeddings, which is
/// projected into the hidden layer. Every paragraph token is projected into
/// the same hidden layer and combined with the question summary. The pointer
/// matrix then scores each paragraph token as the answer start and end.
///
/// The embedding matrix is frozen, only the projections and the pointer
/// matrix are trained.
pub struct PointerModel<R> {
    config: TrainConfig,
    embeds: Array2<f32>,
    question: Array2<f32>,
    paragraph: Array2<f32>,
    pointer: Array2<f32>,
    rng: R,
}

impl<R> PointerModel<R>
where
    R: Rng,
{
    /// Construct a model with randomly initialized parameters.
    ///
    /// Parameters are drawn from a uniform distribution in the range
    /// [-sqrt(6 / (fan_in + fan_out)), sqrt(6 / (fan_in + fan_out))].
    pub fn new(config: TrainConfig, embeds: Array2<f32>, mut rng: R) -> Self {
        let dims = embeds.ncols();
        let hidden = config.hidden_size;

        let projection_bound = (6. / (dims + hidden) as f32).sqrt();
        let projection = Uniform::new_inclusive(-projection_bound, projection_bound);
        let pointer_bound = (6. / (2 + hidden) as f32).sqrt();

        let question = Array2::random_using((dims, hidden), projection, &mut rng);
        let paragraph = Array2::random_using((dims, hidden), projection, &mut rng);
        let pointer = Array2::random_using(
            (2, hidden),
            Uniform::new_inclusive(-pointer_bound, pointer_bound),
            &mut rng,
        );

        PointerModel {
            config,
            embeds,
            question,
            paragraph,
            pointer,
            rng,
        }
    }

    fn dropout_mask(&mut self, keep_prob: f32) -> Option<Array1<f32>> {
        if keep_prob >= 1. {
            return None;
        }

        let rng = &mut self.rng;
        Some(Array1::from_shape_fn(self.embeds.ncols(), |_| {
            if rng.gen::<f32>() < keep_prob {
                1. / keep_prob
            } else {
                0.
            }
        }))
    }
}

impl<R> PointerModel<R> {
    /// Get the model configuration.
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    fn forward(&self, example: &SquadExample, mask: Option<&Array1<f32>>) -> Forward {
        let paragraph = self.embeds.select(Axis(0), &example.paragraph);

        let mut question = self
            .embeds
            .select(Axis(0), &example.question)
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(self.embeds.ncols()));
        if let Some(mask) = mask {
            question *= mask;
        }

        let summary = question.dot(&self.question).mapv(f32::tanh);
        let hidden = (paragraph.dot(&self.paragraph) + &summary).mapv(f32::tanh);
        let logits = hidden.dot(&self.pointer.t());

        let mut start = logits.column(0).to_owned();
        softmax(start.view_mut());
        let mut end = logits.column(1).to_owned();
        softmax(end.view_mut());

        Forward {
            paragraph,
            question,
            summary,
            hidden,
            start,
            end,
        }
    }

    fn backward(&self, span: Span, forward: &Forward, grads: &mut Gradients) {
        let mut d_logits = Array2::<f32>::zeros((forward.hidden.nrows(), 2));
        d_logits.column_mut(0).assign(&forward.start);
        d_logits.column_mut(1).assign(&forward.end);
        d_logits[[span.0, 0]] -= 1.;
        d_logits[[span.1, 1]] -= 1.;

        grads.pointer += &d_logits.t().dot(&forward.hidden);

        let d_hidden = d_logits.dot(&self.pointer);
        let d_pre = d_hidden * &forward.hidden.mapv(|v| 1. - v * v);
        grads.paragraph += &forward.paragraph.t().dot(&d_pre);

        let d_summary = d_pre.sum_axis(Axis(0)) * forward.summary.mapv(|v| 1. - v * v);
        grads.question += &forward
            .question
            .view()
            .insert_axis(Axis(1))
            .dot(&d_summary.view().insert_axis(Axis(0)));
    }
}

impl<R> SpanModel for PointerModel<R>
where
    R: Rng,
{
    fn train_batch(&mut self, batch: &[SquadExample], keep_prob: f32) -> f32 {
        if batch.is_empty() {
            return 0.;
        }

        let mut grads = Gradients::zeros(self.question.dim());
        let mut loss = 0.;
        for example in batch {
            let mask = self.dropout_mask(keep_prob);
            let forward = self.forward(example, mask.as_ref());
            loss += forward.loss(example.span);
            self.backward(example.span, &forward, &mut grads);
        }

        let scale = -self.config.lr / batch.len() as f32;
        self.question.scaled_add(scale, &grads.question);
        self.paragraph.scaled_add(scale, &grads.paragraph);
        self.pointer.scaled_add(scale, &grads.pointer);

        loss
    }

    fn predict(&self, example: &SquadExample) -> Prediction {
        let forward = self.forward(example, None);
        Prediction {
            span: best_span(
                forward.start.view(),
                forward.end.view(),
                self.config.max_answer_len,
            ),
            loss: forward.loss(example.span),
        }
    }

    fn parameters(&self) -> Vec<(&'static str, ArrayView2<f32>)> {
        vec![
            ("w_question", self.question.view()),
            ("w_paragraph", self.paragraph.view()),
            ("w_pointer", self.pointer.view()),
        ]
    }

    fn parameters_mut(&mut self) -> Vec<(&'static str, ArrayViewMut2<f32>)> {
        vec![
            ("w_question", self.question.view_mut()),
            ("w_paragraph", self.paragraph.view_mut()),
            ("w_pointer", self.pointer.view_mut()),
        ]
    }
}

/// Activations of a forward pass.
struct Forward {
    paragraph: Array2<f32>,
    question: Array1<f32>,
    summary: Array1<f32>,
    hidden: Array2<f32>,
    start: Array1<f32>,
    end: Array1<f32>,
}

impl Forward {
    /// Negative log-likelihood of the span.
    ///
    /// Spans outside the paragraph have probability zero.
    fn loss(&self, span: Span) -> f32 {
        let p_start = self.start.get(span.0).copied().unwrap_or(0.);
        let p_end = self.end.get(span.1).copied().unwrap_or(0.);
        -(safe_ln(p_start) + safe_ln(p_end))
    }
}

struct Gradients {
    question: Array2<f32>,
    paragraph: Array2<f32>,
    pointer: Array2<f32>,
}

impl Gradients {
    fn zeros(projection: (usize, usize)) -> Self {
        Gradients {
            question: Array2::zeros(projection),
            paragraph: Array2::zeros(projection),
            pointer: Array2::zeros((2, projection.1)),
        }
    }
}

/// Find the most probable answer span.
///
/// Returns the span (i, j) that maximizes `start[i] * end[j]`, where
/// `i <= j < i + max_len`.
pub fn best_span(start: ArrayView1<f32>, end: ArrayView1<f32>, max_len: usize) -> Span {
    let mut best = (0, 0);
    let mut best_score = f32::NEG_INFINITY;

    for (i, &p_start) in start.iter().enumerate() {
        for (j, &p_end) in end.iter().enumerate().skip(i).take(max_len.max(1)) {
            let score = p_start * p_end;
            if score > best_score {
                best_score = score;
                best = (i, j);
            }
        }
    }

    best
}
